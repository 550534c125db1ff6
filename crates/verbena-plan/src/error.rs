use thiserror::Error;

use verbena_task::ValueType;

/// Compile-time rejection of a graph definition.
///
/// Each variant names the offending node, edge, or handle so the editor
/// layer can point at the violation. None of these cause partial
/// execution; compilation is all-or-nothing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
  #[error("node '{node_id}' references unregistered task type '{task_type}'")]
  UnknownTaskType { node_id: String, task_type: String },

  #[error("node id '{node_id}' is declared more than once")]
  DuplicateNode { node_id: String },

  #[error("edge references unknown node '{node_id}'")]
  UnknownNode { node_id: String },

  #[error("node '{node_id}' connects to itself")]
  SelfConnection { node_id: String },

  #[error("node '{node_id}' has no {kind} named '{handle}'")]
  UnknownHandle {
    node_id: String,
    handle: String,
    kind: HandleKind,
  },

  #[error(
    "type mismatch on edge {source}.{source_output} -> {target}.{target_input}: \
     {source_type} does not match {target_type}"
  )]
  TypeMismatch {
    source: String,
    source_output: String,
    target: String,
    target_input: String,
    source_type: ValueType,
    target_type: ValueType,
  },

  #[error("cycle detected through edge {source} -> {target}")]
  CycleDetected { source: String, target: String },

  #[error("required input '{input}' of node '{node_id}' is not satisfied")]
  MissingInput { node_id: String, input: String },

  #[error("input '{input}' of node '{node_id}' is fed by more than one edge")]
  DuplicateInput { node_id: String, input: String },

  #[error("graph has no entry-point node with satisfied inputs")]
  NoEntryPoint,

  #[error("node '{node_id}' is not reachable from any entry point")]
  UnreachableNode { node_id: String },
}

/// Which side of a contract a named handle was expected on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
  Input,
  Output,
}

impl std::fmt::Display for HandleKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      HandleKind::Input => write!(f, "input"),
      HandleKind::Output => write!(f, "output"),
    }
  }
}
