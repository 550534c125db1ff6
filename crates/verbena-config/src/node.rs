use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single node in a user-authored graph.
///
/// Inputs not present in `inputs` must be supplied by an incoming edge;
/// the compiler rejects the graph otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
  /// Node id, unique within the graph.
  pub node_id: String,
  /// Task type, resolved against the task registry at compile time.
  pub task_type: String,
  /// Literal input values, keyed by input name. May be empty or partial.
  #[serde(default)]
  pub inputs: BTreeMap<String, String>,
}
