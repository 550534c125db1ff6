//! The compiler passes.
//!
//! Pass order matters: the first violation wins, and later passes may
//! assume the invariants the earlier ones established (layering in
//! particular assumes acyclicity).

use std::collections::VecDeque;

use verbena_config::GraphDef;
use verbena_task::{TaskContract, TaskRegistry};

use crate::error::{CompileError, HandleKind};
use crate::graph::GraphIndex;
use crate::plan::{ExecutionPlan, InputBinding, Phase, PlanNode};

/// Compile a graph definition into an ordered execution plan.
///
/// Deterministic and pure: identical definitions yield identical plans or
/// identical errors, and no I/O happens here.
pub fn compile(def: &GraphDef, registry: &TaskRegistry) -> Result<ExecutionPlan, CompileError> {
  let contracts = resolve_contracts(def, registry)?;
  let graph = GraphIndex::new(def)?;

  validate_connections(def, &graph, &contracts)?;
  detect_cycles(def, &graph)?;
  validate_inputs(def, &graph, &contracts)?;

  let entries = entry_points(def, &contracts);
  if entries.is_empty() {
    return Err(CompileError::NoEntryPoint);
  }
  validate_reachability(def, &graph, &entries)?;

  let phase_of = assign_phases(def, &graph);
  Ok(build_plan(def, &graph, &phase_of))
}

/// Every node's task type must be registered before anything else runs.
fn resolve_contracts<'r>(
  def: &GraphDef,
  registry: &'r TaskRegistry,
) -> Result<Vec<&'r TaskContract>, CompileError> {
  def
    .nodes
    .iter()
    .map(|node| {
      registry
        .contract(&node.task_type)
        .map_err(|_| CompileError::UnknownTaskType {
          node_id: node.node_id.clone(),
          task_type: node.task_type.clone(),
        })
    })
    .collect()
}

/// Per edge: no self-connections, both handles must exist on the
/// respective contracts, and their value types must match.
fn validate_connections(
  def: &GraphDef,
  graph: &GraphIndex<'_>,
  contracts: &[&TaskContract],
) -> Result<(), CompileError> {
  for edge in &def.edges {
    if edge.source == edge.target {
      return Err(CompileError::SelfConnection {
        node_id: edge.source.clone(),
      });
    }

    let source_contract = contracts[graph.node_idx(&edge.source)];
    let target_contract = contracts[graph.node_idx(&edge.target)];

    let output =
      source_contract
        .output(&edge.source_output)
        .ok_or_else(|| CompileError::UnknownHandle {
          node_id: edge.source.clone(),
          handle: edge.source_output.clone(),
          kind: HandleKind::Output,
        })?;
    let input =
      target_contract
        .input(&edge.target_input)
        .ok_or_else(|| CompileError::UnknownHandle {
          node_id: edge.target.clone(),
          handle: edge.target_input.clone(),
          kind: HandleKind::Input,
        })?;

    if output.value_type != input.value_type {
      return Err(CompileError::TypeMismatch {
        source: edge.source.clone(),
        source_output: edge.source_output.clone(),
        target: edge.target.clone(),
        target_input: edge.target_input.clone(),
        source_type: output.value_type,
        target_type: input.value_type,
      });
    }
  }
  Ok(())
}

/// Depth-first traversal from each edge's target; reaching the edge's own
/// source again means the edge closes a cycle. The whole graph is
/// rejected, never partially salvaged.
fn detect_cycles(def: &GraphDef, graph: &GraphIndex<'_>) -> Result<(), CompileError> {
  for edge in &def.edges {
    let source_idx = graph.node_idx(&edge.source);
    let target_idx = graph.node_idx(&edge.target);

    let mut visited = vec![false; graph.node_count()];
    let mut stack = vec![target_idx];
    while let Some(current) = stack.pop() {
      if current == source_idx {
        return Err(CompileError::CycleDetected {
          source: edge.source.clone(),
          target: edge.target.clone(),
        });
      }
      if visited[current] {
        continue;
      }
      visited[current] = true;
      stack.extend(graph.successors(current));
    }
  }
  Ok(())
}

/// Every declared input is fed by at most one edge, and every required
/// input is fed by a literal or by exactly one edge.
fn validate_inputs(
  def: &GraphDef,
  graph: &GraphIndex<'_>,
  contracts: &[&TaskContract],
) -> Result<(), CompileError> {
  for (idx, node) in def.nodes.iter().enumerate() {
    for spec in &contracts[idx].inputs {
      let feeding_edges = graph
        .incoming(idx)
        .iter()
        .filter(|&&e| graph.edge(e).target_input == spec.name)
        .count();

      if feeding_edges > 1 {
        return Err(CompileError::DuplicateInput {
          node_id: node.node_id.clone(),
          input: spec.name.clone(),
        });
      }
      if spec.required && feeding_edges == 0 && !node.inputs.contains_key(&spec.name) {
        return Err(CompileError::MissingInput {
          node_id: node.node_id.clone(),
          input: spec.name.clone(),
        });
      }
    }
  }
  Ok(())
}

/// A node qualifies as an entry point when its contract allows starting a
/// graph and every required input is satisfied by a literal, with no
/// dependence on upstream data.
fn entry_points(def: &GraphDef, contracts: &[&TaskContract]) -> Vec<usize> {
  def
    .nodes
    .iter()
    .enumerate()
    .filter(|(idx, node)| {
      contracts[*idx].entry_point
        && contracts[*idx]
          .inputs
          .iter()
          .filter(|i| i.required)
          .all(|i| node.inputs.contains_key(&i.name))
    })
    .map(|(idx, _)| idx)
    .collect()
}

/// Every node must be reachable from some entry point by forward edges.
/// Orphan subgraphs would otherwise compile into phase 1 and run with no
/// data path back to the result the user asked for.
fn validate_reachability(
  def: &GraphDef,
  graph: &GraphIndex<'_>,
  entries: &[usize],
) -> Result<(), CompileError> {
  let mut reachable = vec![false; graph.node_count()];
  let mut queue: VecDeque<usize> = entries.iter().copied().collect();
  for &e in entries {
    reachable[e] = true;
  }
  while let Some(current) = queue.pop_front() {
    for next in graph.successors(current) {
      if !reachable[next] {
        reachable[next] = true;
        queue.push_back(next);
      }
    }
  }

  match reachable.iter().position(|&r| !r) {
    Some(idx) => Err(CompileError::UnreachableNode {
      node_id: def.nodes[idx].node_id.clone(),
    }),
    None => Ok(()),
  }
}

/// Longest-path layering: a node's phase is one past the maximum phase of
/// all nodes feeding it, so it waits for every dependency, including ones
/// reachable through longer chains. Nodes with no incoming edges sit in
/// phase 1.
///
/// Relaxation over the edge list converges within `node_count` sweeps on
/// an acyclic graph (cycles were rejected earlier).
fn assign_phases(def: &GraphDef, graph: &GraphIndex<'_>) -> Vec<u32> {
  let mut phase = vec![1u32; graph.node_count()];
  loop {
    let mut changed = false;
    for edge in &def.edges {
      let source = graph.node_idx(&edge.source);
      let target = graph.node_idx(&edge.target);
      if phase[target] <= phase[source] {
        phase[target] = phase[source] + 1;
        changed = true;
      }
    }
    if !changed {
      return phase;
    }
  }
}

/// Group nodes into ascending phases, keeping definition order within a
/// phase so identical definitions serialize to identical plans.
fn build_plan(def: &GraphDef, graph: &GraphIndex<'_>, phase_of: &[u32]) -> ExecutionPlan {
  let max_phase = phase_of.iter().copied().max().unwrap_or(0);

  let phases = (1..=max_phase)
    .map(|number| Phase {
      number,
      nodes: def
        .nodes
        .iter()
        .enumerate()
        .filter(|(idx, _)| phase_of[*idx] == number)
        .map(|(idx, node)| {
          let mut bindings: Vec<InputBinding> = graph
            .incoming(idx)
            .iter()
            .map(|&e| {
              let edge = graph.edge(e);
              InputBinding {
                input: edge.target_input.clone(),
                source_node: edge.source.clone(),
                source_output: edge.source_output.clone(),
              }
            })
            .collect();
          bindings.sort_by(|a, b| a.input.cmp(&b.input));

          PlanNode {
            node_id: node.node_id.clone(),
            task_type: node.task_type.clone(),
            literal_inputs: node.inputs.clone(),
            bindings,
          }
        })
        .collect(),
    })
    .collect();

  ExecutionPlan {
    workflow_id: def.workflow_id.clone(),
    phases,
  }
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;
  use std::sync::Arc;

  use async_trait::async_trait;
  use tokio_util::sync::CancellationToken;
  use verbena_config::{EdgeDef, NodeDef};
  use verbena_task::{
    InputSpec, OutputSpec, TaskBehavior, TaskError, TaskInvocation, TaskOutputs, ValueType,
  };

  use super::*;

  struct NoopTask;

  #[async_trait]
  impl TaskBehavior for NoopTask {
    async fn execute(
      &self,
      _invocation: TaskInvocation,
      _cancel: CancellationToken,
    ) -> Result<TaskOutputs, TaskError> {
      Ok(BTreeMap::new())
    }
  }

  fn input(name: &str, value_type: ValueType) -> InputSpec {
    InputSpec {
      name: name.to_string(),
      value_type,
      required: true,
    }
  }

  fn output(name: &str, value_type: ValueType) -> OutputSpec {
    OutputSpec {
      name: name.to_string(),
      value_type,
    }
  }

  /// Registry mirroring the built-in web catalog shapes.
  fn registry() -> TaskRegistry {
    let mut registry = TaskRegistry::new();
    registry.register(
      TaskContract {
        task_type: "fetch_page".to_string(),
        inputs: vec![input("url", ValueType::String)],
        outputs: vec![output("html", ValueType::Html)],
        credit_cost: 2,
        entry_point: true,
      },
      Arc::new(NoopTask),
    );
    registry.register(
      TaskContract {
        task_type: "extract_text".to_string(),
        inputs: vec![input("html", ValueType::Html), input("selector", ValueType::String)],
        outputs: vec![output("text", ValueType::String)],
        credit_cost: 1,
        entry_point: false,
      },
      Arc::new(NoopTask),
    );
    registry.register(
      TaskContract {
        task_type: "deliver_webhook".to_string(),
        inputs: vec![input("url", ValueType::String), input("body", ValueType::String)],
        outputs: vec![],
        credit_cost: 1,
        entry_point: false,
      },
      Arc::new(NoopTask),
    );
    registry
  }

  fn node(id: &str, task_type: &str, literals: &[(&str, &str)]) -> NodeDef {
    NodeDef {
      node_id: id.to_string(),
      task_type: task_type.to_string(),
      inputs: literals
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect(),
    }
  }

  fn edge(source: &str, source_output: &str, target: &str, target_input: &str) -> EdgeDef {
    EdgeDef {
      source: source.to_string(),
      source_output: source_output.to_string(),
      target: target.to_string(),
      target_input: target_input.to_string(),
    }
  }

  fn graph(nodes: Vec<NodeDef>, edges: Vec<EdgeDef>) -> GraphDef {
    GraphDef {
      workflow_id: "wf-test".to_string(),
      name: "test".to_string(),
      nodes,
      edges,
    }
  }

  fn fetch(id: &str) -> NodeDef {
    node(id, "fetch_page", &[("url", "https://example.com")])
  }

  #[test]
  fn two_node_example_compiles_to_two_phases() {
    let def = graph(
      vec![fetch("a"), node("b", "extract_text", &[("selector", "h1")])],
      vec![edge("a", "html", "b", "html")],
    );

    let plan = compile(&def, &registry()).unwrap();
    assert_eq!(plan.phases.len(), 2);
    assert_eq!(plan.phases[0].number, 1);
    assert_eq!(plan.phases[0].nodes[0].node_id, "a");
    assert_eq!(plan.phases[1].nodes[0].node_id, "b");

    let binding = plan.phases[1].nodes[0].binding("html").unwrap();
    assert_eq!(binding.source_node, "a");
    assert_eq!(binding.source_output, "html");
  }

  #[test]
  fn diamond_layers_independent_nodes_together() {
    let def = graph(
      vec![
        fetch("a"),
        node("b", "extract_text", &[("selector", "h1")]),
        node("c", "extract_text", &[("selector", "p")]),
        node("d", "deliver_webhook", &[]),
      ],
      vec![
        edge("a", "html", "b", "html"),
        edge("a", "html", "c", "html"),
        edge("b", "text", "d", "url"),
        edge("c", "text", "d", "body"),
      ],
    );

    let plan = compile(&def, &registry()).unwrap();
    assert_eq!(plan.phases.len(), 3);
    let phase2: Vec<&str> = plan.phases[1].nodes.iter().map(|n| n.node_id.as_str()).collect();
    assert_eq!(phase2, vec!["b", "c"]);
    assert_eq!(plan.phases[2].nodes[0].node_id, "d");

    // No binding may point at a later-or-equal phase.
    for phase in &plan.phases {
      for plan_node in &phase.nodes {
        for binding in &plan_node.bindings {
          let (source_phase, _) = plan.find_node(&binding.source_node).unwrap();
          assert!(source_phase < phase.number);
        }
      }
    }
  }

  #[test]
  fn layering_waits_for_the_longest_chain() {
    // c receives data both directly from a and through b; it must land
    // one past b, not alongside it.
    let def = graph(
      vec![
        fetch("a"),
        node("b", "extract_text", &[("selector", "h1")]),
        node("c", "extract_text", &[]),
      ],
      vec![
        edge("a", "html", "b", "html"),
        edge("a", "html", "c", "html"),
        edge("b", "text", "c", "selector"),
      ],
    );

    let plan = compile(&def, &registry()).unwrap();
    let (phase, _) = plan.find_node("c").unwrap();
    assert_eq!(phase, 3);
  }

  #[test]
  fn cycle_is_rejected() {
    let def = graph(
      vec![
        node("a", "extract_text", &[("html", "<p/>")]),
        node("b", "extract_text", &[("html", "<p/>")]),
      ],
      vec![
        edge("a", "text", "b", "selector"),
        edge("b", "text", "a", "selector"),
      ],
    );

    assert!(matches!(
      compile(&def, &registry()),
      Err(CompileError::CycleDetected { .. })
    ));
  }

  #[test]
  fn self_connection_is_rejected() {
    let def = graph(
      vec![node("a", "extract_text", &[("html", "<p/>")])],
      vec![edge("a", "text", "a", "selector")],
    );

    assert!(matches!(
      compile(&def, &registry()),
      Err(CompileError::SelfConnection { node_id }) if node_id == "a"
    ));
  }

  #[test]
  fn type_mismatch_is_rejected() {
    // html (Html) into a webhook url (String).
    let def = graph(
      vec![fetch("a"), node("b", "deliver_webhook", &[("body", "{}")])],
      vec![edge("a", "html", "b", "url")],
    );

    match compile(&def, &registry()) {
      Err(CompileError::TypeMismatch {
        source,
        target_input,
        source_type,
        target_type,
        ..
      }) => {
        assert_eq!(source, "a");
        assert_eq!(target_input, "url");
        assert_eq!(source_type, ValueType::Html);
        assert_eq!(target_type, ValueType::String);
      }
      other => panic!("expected TypeMismatch, got {:?}", other),
    }
  }

  #[test]
  fn unknown_handle_is_rejected() {
    let def = graph(
      vec![fetch("a"), node("b", "extract_text", &[("selector", "h1")])],
      vec![edge("a", "page", "b", "html")],
    );

    assert!(matches!(
      compile(&def, &registry()),
      Err(CompileError::UnknownHandle { node_id, handle, .. })
        if node_id == "a" && handle == "page"
    ));
  }

  #[test]
  fn edge_to_unknown_node_is_rejected() {
    let def = graph(vec![fetch("a")], vec![edge("a", "html", "ghost", "html")]);

    assert!(matches!(
      compile(&def, &registry()),
      Err(CompileError::UnknownNode { node_id }) if node_id == "ghost"
    ));
  }

  #[test]
  fn unregistered_task_type_is_rejected() {
    let def = graph(vec![node("a", "launch_rocket", &[])], vec![]);

    assert!(matches!(
      compile(&def, &registry()),
      Err(CompileError::UnknownTaskType { task_type, .. }) if task_type == "launch_rocket"
    ));
  }

  #[test]
  fn duplicate_node_id_is_rejected() {
    let def = graph(vec![fetch("a"), fetch("a")], vec![]);

    assert!(matches!(
      compile(&def, &registry()),
      Err(CompileError::DuplicateNode { node_id }) if node_id == "a"
    ));
  }

  #[test]
  fn unsatisfied_required_input_is_rejected() {
    // b gets html over the edge but declares no selector anywhere.
    let def = graph(
      vec![fetch("a"), node("b", "extract_text", &[])],
      vec![edge("a", "html", "b", "html")],
    );

    assert!(matches!(
      compile(&def, &registry()),
      Err(CompileError::MissingInput { node_id, input })
        if node_id == "b" && input == "selector"
    ));
  }

  #[test]
  fn doubly_fed_input_is_rejected() {
    let def = graph(
      vec![
        fetch("a1"),
        fetch("a2"),
        node("b", "extract_text", &[("selector", "h1")]),
      ],
      vec![edge("a1", "html", "b", "html"), edge("a2", "html", "b", "html")],
    );

    assert!(matches!(
      compile(&def, &registry()),
      Err(CompileError::DuplicateInput { node_id, input })
        if node_id == "b" && input == "html"
    ));
  }

  #[test]
  fn graph_without_entry_point_is_rejected() {
    let def = graph(
      vec![node("a", "extract_text", &[("html", "<p/>"), ("selector", "p")])],
      vec![],
    );

    assert!(matches!(compile(&def, &registry()), Err(CompileError::NoEntryPoint)));
  }

  #[test]
  fn entry_point_fed_by_edge_does_not_qualify() {
    // f carries the entry-point contract but depends on upstream data,
    // so nothing can start the graph.
    let def = graph(
      vec![
        node("e", "extract_text", &[("html", "<p/>"), ("selector", "p")]),
        node("f", "fetch_page", &[]),
      ],
      vec![edge("e", "text", "f", "url")],
    );

    assert!(matches!(compile(&def, &registry()), Err(CompileError::NoEntryPoint)));
  }

  #[test]
  fn node_unreachable_from_entry_is_rejected() {
    let def = graph(
      vec![
        fetch("a"),
        node("z", "extract_text", &[("html", "<p/>"), ("selector", "p")]),
      ],
      vec![],
    );

    assert!(matches!(
      compile(&def, &registry()),
      Err(CompileError::UnreachableNode { node_id }) if node_id == "z"
    ));
  }

  #[test]
  fn compilation_is_deterministic() {
    let def = graph(
      vec![
        fetch("a"),
        node("b", "extract_text", &[("selector", "h1")]),
        node("c", "extract_text", &[("selector", "p")]),
        node("d", "deliver_webhook", &[]),
      ],
      vec![
        edge("a", "html", "b", "html"),
        edge("a", "html", "c", "html"),
        edge("b", "text", "d", "url"),
        edge("c", "text", "d", "body"),
      ],
    );
    let registry = registry();

    let first = compile(&def, &registry).unwrap();
    let second = compile(&def, &registry).unwrap();
    assert_eq!(first, second);
    assert_eq!(
      serde_json::to_string(&first).unwrap(),
      serde_json::to_string(&second).unwrap()
    );
  }
}
