use std::fmt;

use serde::{Deserialize, Serialize};

/// Declared type of a value flowing through an input or output handle.
///
/// Edges may only connect handles of equal value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
  /// Plain text.
  String,
  /// An HTML document or fragment.
  Html,
}

impl fmt::Display for ValueType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ValueType::String => write!(f, "string"),
      ValueType::Html => write!(f, "html"),
    }
  }
}

/// A declared input handle on a task contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSpec {
  pub name: String,
  pub value_type: ValueType,
  #[serde(default)]
  pub required: bool,
}

/// A declared output handle on a task contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSpec {
  pub name: String,
  pub value_type: ValueType,
}

/// The immutable contract for one task type.
///
/// Declared once at registration and never mutated during execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskContract {
  /// Task type identifier, e.g. "fetch_page".
  pub task_type: String,
  /// Declared inputs, in declaration order.
  pub inputs: Vec<InputSpec>,
  /// Declared outputs, in declaration order.
  pub outputs: Vec<OutputSpec>,
  /// Credits charged when a node of this type completes.
  pub credit_cost: u32,
  /// Whether a node of this type may start a graph.
  pub entry_point: bool,
}

impl TaskContract {
  /// Look up a declared input by name.
  pub fn input(&self, name: &str) -> Option<&InputSpec> {
    self.inputs.iter().find(|i| i.name == name)
  }

  /// Look up a declared output by name.
  pub fn output(&self, name: &str) -> Option<&OutputSpec> {
    self.outputs.iter().find(|o| o.name == name)
  }
}
