use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// An incoming edge resolved at compile time: the named input is read
/// from the source node's recorded output at run time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputBinding {
  pub input: String,
  pub source_node: String,
  pub source_output: String,
}

/// A node as it appears in a compiled plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanNode {
  pub node_id: String,
  pub task_type: String,
  /// Literal input values carried over from the definition. Ordered map
  /// so serialized plans are deterministic.
  #[serde(default)]
  pub literal_inputs: BTreeMap<String, String>,
  /// Incoming edges, sorted by input name.
  #[serde(default)]
  pub bindings: Vec<InputBinding>,
}

impl PlanNode {
  /// The binding feeding the named input, if any.
  pub fn binding(&self, input: &str) -> Option<&InputBinding> {
    self.bindings.iter().find(|b| b.input == input)
  }
}

/// One execution phase: a set of mutually independent nodes.
///
/// Phase numbers are 1-based and contiguous. Node order within a phase is
/// stable across compiles but carries no execution meaning; the engine
/// must not depend on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
  pub number: u32,
  pub nodes: Vec<PlanNode>,
}

/// A validated, ordered execution plan ready for the engine.
///
/// Invariant: every binding's source node sits in a strictly earlier
/// phase than the node carrying the binding, so every producer has
/// completed before any consumer resolves its inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
  pub workflow_id: String,
  pub phases: Vec<Phase>,
}

impl ExecutionPlan {
  /// Total number of nodes across all phases.
  pub fn node_count(&self) -> usize {
    self.phases.iter().map(|p| p.nodes.len()).sum()
  }

  /// Find a node and the number of the phase holding it.
  pub fn find_node(&self, node_id: &str) -> Option<(u32, &PlanNode)> {
    self.phases.iter().find_map(|phase| {
      phase
        .nodes
        .iter()
        .find(|n| n.node_id == node_id)
        .map(|n| (phase.number, n))
    })
  }
}
