//! Arena-indexed view of a graph definition.
//!
//! Nodes and edges are addressed by their position in the definition's
//! vectors. Integer indices keep traversal cheap and make iteration
//! order (and therefore compile output) deterministic.

use std::collections::HashMap;

use verbena_config::{EdgeDef, GraphDef};

use crate::error::CompileError;

pub(crate) struct GraphIndex<'a> {
  def: &'a GraphDef,
  id_to_idx: HashMap<&'a str, usize>,
  /// Incoming edge indices per node.
  incoming: Vec<Vec<usize>>,
  /// Outgoing edge indices per node.
  outgoing: Vec<Vec<usize>>,
}

impl<'a> GraphIndex<'a> {
  /// Index the definition. Fails on duplicate node ids and on edges
  /// referencing nodes that do not exist.
  pub(crate) fn new(def: &'a GraphDef) -> Result<Self, CompileError> {
    let mut id_to_idx = HashMap::with_capacity(def.nodes.len());
    for (idx, node) in def.nodes.iter().enumerate() {
      if id_to_idx.insert(node.node_id.as_str(), idx).is_some() {
        return Err(CompileError::DuplicateNode {
          node_id: node.node_id.clone(),
        });
      }
    }

    let mut incoming = vec![Vec::new(); def.nodes.len()];
    let mut outgoing = vec![Vec::new(); def.nodes.len()];
    for (edge_idx, edge) in def.edges.iter().enumerate() {
      let source = *id_to_idx
        .get(edge.source.as_str())
        .ok_or_else(|| CompileError::UnknownNode {
          node_id: edge.source.clone(),
        })?;
      let target = *id_to_idx
        .get(edge.target.as_str())
        .ok_or_else(|| CompileError::UnknownNode {
          node_id: edge.target.clone(),
        })?;
      outgoing[source].push(edge_idx);
      incoming[target].push(edge_idx);
    }

    Ok(Self {
      def,
      id_to_idx,
      incoming,
      outgoing,
    })
  }

  pub(crate) fn node_count(&self) -> usize {
    self.def.nodes.len()
  }

  pub(crate) fn node_idx(&self, node_id: &str) -> usize {
    // Only called with ids already validated by `new`.
    self.id_to_idx[node_id]
  }

  pub(crate) fn edge(&self, edge_idx: usize) -> &'a EdgeDef {
    &self.def.edges[edge_idx]
  }

  /// Incoming edge indices of a node.
  pub(crate) fn incoming(&self, node_idx: usize) -> &[usize] {
    &self.incoming[node_idx]
  }

  /// Node indices directly downstream of a node.
  pub(crate) fn successors(&self, node_idx: usize) -> impl Iterator<Item = usize> + '_ {
    self.outgoing[node_idx]
      .iter()
      .map(|&e| self.node_idx(&self.def.edges[e].target))
  }
}
