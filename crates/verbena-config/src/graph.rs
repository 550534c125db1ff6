use serde::{Deserialize, Serialize};

use crate::edge::EdgeDef;
use crate::node::NodeDef;

/// A complete user-authored graph definition.
///
/// This is the serializable envelope the editor layer hands to the
/// compiler. It is treated as an immutable snapshot: compilation never
/// mutates it, and identical definitions always compile to identical
/// plans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDef {
  /// Workflow id, assigned by the external storage layer.
  pub workflow_id: String,
  /// Human-readable workflow name.
  pub name: String,
  /// Nodes in this graph.
  #[serde(default)]
  pub nodes: Vec<NodeDef>,
  /// Edges connecting node outputs to node inputs.
  #[serde(default)]
  pub edges: Vec<EdgeDef>,
}

impl GraphDef {
  /// Look up a node by id.
  pub fn get_node(&self, node_id: &str) -> Option<&NodeDef> {
    self.nodes.iter().find(|n| n.node_id == node_id)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_minimal_definition() {
    let raw = r#"{
      "workflow_id": "wf-1",
      "name": "Scrape and deliver",
      "nodes": [
        {"node_id": "a", "task_type": "fetch_page", "inputs": {"url": "https://example.com"}},
        {"node_id": "b", "task_type": "extract_text"}
      ],
      "edges": [
        {"source": "a", "source_output": "html", "target": "b", "target_input": "html"}
      ]
    }"#;

    let def: GraphDef = serde_json::from_str(raw).unwrap();
    assert_eq!(def.nodes.len(), 2);
    assert_eq!(def.edges.len(), 1);
    assert_eq!(
      def.get_node("a").unwrap().inputs.get("url").unwrap(),
      "https://example.com"
    );
    // Omitted inputs default to empty rather than failing deserialization.
    assert!(def.get_node("b").unwrap().inputs.is_empty());
  }
}
