use serde::{Deserialize, Serialize};

/// A data dependency between two nodes.
///
/// The target node's input is produced by the source node's output. Both
/// handles must exist on the respective task contracts and carry the same
/// value type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeDef {
  /// Source node id.
  pub source: String,
  /// Output handle on the source node's contract.
  pub source_output: String,
  /// Target node id.
  pub target: String,
  /// Input handle on the target node's contract.
  pub target_input: String,
}
