//! Phase execution: input resolution, dispatch, bookkeeping.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use verbena_plan::{Phase, PlanNode};
use verbena_task::{TaskContract, TaskInvocation, TaskOutputs, TaskRegistry};

use crate::context::ExecutionContext;
use crate::engine::LiteralOverrides;
use crate::events::{RunEvent, RunNotifier};
use crate::result::{LogEntry, NodeStatus};

/// Terminal outcome of one node within a phase.
///
/// Outcomes carry everything the driver needs to fold into the execution
/// context after the barrier: produced outputs, charged credits, and the
/// log lines the node generated.
pub(crate) struct NodeOutcome {
  pub node_id: String,
  pub task_type: String,
  pub status: NodeStatus,
  pub inputs_resolved: BTreeMap<String, String>,
  pub outputs: BTreeMap<String, String>,
  pub started_at: DateTime<Utc>,
  pub completed_at: DateTime<Utc>,
  pub credits: u32,
  pub failure: Option<String>,
  pub log: Vec<LogEntry>,
}

/// Execute every node of one phase concurrently and wait for all of them
/// to reach a terminal status.
///
/// Nodes in one phase have no edges between them (compiler invariant), so
/// the only shared state is the read-only context snapshot taken here.
pub(crate) async fn execute_phase<N: RunNotifier>(
  run_id: &str,
  phase: &Phase,
  registry: &TaskRegistry,
  ctx: &ExecutionContext,
  overrides: &LiteralOverrides,
  cancel: &CancellationToken,
  notifier: &N,
) -> Vec<NodeOutcome> {
  let mut outcomes: Vec<(usize, NodeOutcome)> = Vec::with_capacity(phase.nodes.len());
  let mut spawned_meta: Vec<(usize, BTreeMap<String, String>)> = Vec::new();
  let mut handles = Vec::new();

  for (slot, node) in phase.nodes.iter().enumerate() {
    let task = match registry.get(&node.task_type) {
      Ok(task) => task,
      Err(e) => {
        // The compiler resolved every task type; losing one now is a
        // defect, not a runtime condition.
        error!(
          run_id = %run_id,
          node_id = %node.node_id,
          task_type = %node.task_type,
          "registered task type vanished after compilation"
        );
        let outcome = invariant_failure(node, e.to_string());
        notify_failed(run_id, notifier, &outcome);
        outcomes.push((slot, outcome));
        continue;
      }
    };

    match resolve_inputs(node, &task.contract, ctx, overrides) {
      Ok(inputs) => {
        notifier.notify(RunEvent::NodeStarted {
          run_id: run_id.to_string(),
          node_id: node.node_id.clone(),
          phase: phase.number,
        });
        info!(
          run_id = %run_id,
          node_id = %node.node_id,
          phase = phase.number,
          "task_started"
        );

        let behavior = task.behavior.clone();
        let invocation = TaskInvocation {
          run_id: run_id.to_string(),
          node_id: node.node_id.clone(),
          inputs: inputs.clone(),
        };
        let token = cancel.child_token();

        spawned_meta.push((slot, inputs));
        handles.push(tokio::spawn(async move {
          let started_at = Utc::now();
          let result = behavior.execute(invocation, token).await;
          (started_at, Utc::now(), result)
        }));
      }
      Err(input) => {
        // Validated graphs cannot reach this point; treat it as an
        // internal invariant violation rather than guessing at a value.
        error!(
          run_id = %run_id,
          node_id = %node.node_id,
          input = %input,
          "required input unresolved at dispatch despite compilation"
        );
        let outcome = invariant_failure(
          node,
          format!("required input '{}' was unresolved at dispatch", input),
        );
        notify_failed(run_id, notifier, &outcome);
        outcomes.push((slot, outcome));
      }
    }
  }

  // The phase barrier: every spawned node reaches a terminal status
  // before the phase is considered finished.
  let joined = join_all(handles).await;

  for ((slot, inputs_resolved), join_result) in spawned_meta.into_iter().zip(joined) {
    let node = &phase.nodes[slot];
    // Lookup cannot fail here; the node was dispatched above.
    let contract = match registry.contract(&node.task_type) {
      Ok(contract) => contract,
      Err(e) => {
        let outcome = invariant_failure(node, e.to_string());
        notify_failed(run_id, notifier, &outcome);
        outcomes.push((slot, outcome));
        continue;
      }
    };

    let outcome = match join_result {
      Ok((started_at, completed_at, Ok(produced))) => {
        finish_node(node, contract, inputs_resolved, started_at, completed_at, produced)
      }
      Ok((started_at, completed_at, Err(task_error))) => failed_outcome(
        node,
        inputs_resolved,
        started_at,
        completed_at,
        task_error.to_string(),
      ),
      Err(join_error) => {
        let now = Utc::now();
        failed_outcome(
          node,
          inputs_resolved,
          now,
          now,
          format!("task aborted: {}", join_error),
        )
      }
    };

    match outcome.status {
      NodeStatus::Completed => {
        notifier.notify(RunEvent::NodeCompleted {
          run_id: run_id.to_string(),
          node_id: outcome.node_id.clone(),
          credits: outcome.credits,
        });
        info!(
          run_id = %run_id,
          node_id = %outcome.node_id,
          credits = outcome.credits,
          "task_completed"
        );
      }
      _ => {
        let reason = outcome.failure.as_deref().unwrap_or("unknown reason");
        notifier.notify(RunEvent::NodeFailed {
          run_id: run_id.to_string(),
          node_id: outcome.node_id.clone(),
          error: reason.to_string(),
        });
        error!(
          run_id = %run_id,
          node_id = %outcome.node_id,
          error = %reason,
          "task_failed"
        );
      }
    }

    outcomes.push((slot, outcome));
  }

  // Report outcomes in plan order regardless of completion order.
  outcomes.sort_by_key(|(slot, _)| *slot);
  outcomes.into_iter().map(|(_, outcome)| outcome).collect()
}

/// Resolve one node's inputs against the context and its literals.
///
/// Precedence per input: the compiled binding reads the producer's
/// recorded output; otherwise a caller override wins over the compiled
/// literal. Returns the name of the first required input that cannot be
/// resolved.
fn resolve_inputs(
  node: &PlanNode,
  contract: &TaskContract,
  ctx: &ExecutionContext,
  overrides: &LiteralOverrides,
) -> Result<BTreeMap<String, String>, String> {
  let node_overrides = overrides.get(&node.node_id);
  let mut resolved = BTreeMap::new();

  for spec in &contract.inputs {
    let value = if let Some(binding) = node.binding(&spec.name) {
      ctx
        .output(&binding.source_node, &binding.source_output)
        .map(str::to_string)
    } else if let Some(value) = node_overrides.and_then(|m| m.get(&spec.name)) {
      Some(value.clone())
    } else {
      node.literal_inputs.get(&spec.name).cloned()
    };

    match value {
      Some(value) => {
        resolved.insert(spec.name.clone(), value);
      }
      None if spec.required => return Err(spec.name.clone()),
      None => {}
    }
  }

  Ok(resolved)
}

/// Build the outcome for a behavior that returned successfully, checking
/// that every declared output was actually produced.
fn finish_node(
  node: &PlanNode,
  contract: &TaskContract,
  inputs_resolved: BTreeMap<String, String>,
  started_at: DateTime<Utc>,
  completed_at: DateTime<Utc>,
  produced: TaskOutputs,
) -> NodeOutcome {
  let mut outputs = BTreeMap::new();
  for spec in &contract.outputs {
    match produced.get(&spec.name) {
      Some(value) => {
        outputs.insert(spec.name.clone(), value.clone());
      }
      None => {
        return failed_outcome(
          node,
          inputs_resolved,
          started_at,
          completed_at,
          format!("behavior omitted declared output '{}'", spec.name),
        );
      }
    }
  }

  let duration_ms = (completed_at - started_at).num_milliseconds();
  NodeOutcome {
    node_id: node.node_id.clone(),
    task_type: node.task_type.clone(),
    status: NodeStatus::Completed,
    inputs_resolved,
    outputs,
    started_at,
    completed_at,
    credits: contract.credit_cost,
    failure: None,
    log: vec![LogEntry::info(
      Some(&node.node_id),
      format!("completed in {} ms", duration_ms),
    )],
  }
}

fn failed_outcome(
  node: &PlanNode,
  inputs_resolved: BTreeMap<String, String>,
  started_at: DateTime<Utc>,
  completed_at: DateTime<Utc>,
  reason: String,
) -> NodeOutcome {
  NodeOutcome {
    node_id: node.node_id.clone(),
    task_type: node.task_type.clone(),
    status: NodeStatus::Failed,
    inputs_resolved,
    outputs: BTreeMap::new(),
    started_at,
    completed_at,
    credits: 0,
    failure: Some(reason.clone()),
    log: vec![LogEntry::error(Some(&node.node_id), reason)],
  }
}

/// An invariant violation: the node fails without dispatch and the reason
/// lands in the log with full context.
fn invariant_failure(node: &PlanNode, reason: String) -> NodeOutcome {
  let now = Utc::now();
  failed_outcome(
    node,
    BTreeMap::new(),
    now,
    now,
    format!("internal error: {}", reason),
  )
}

fn notify_failed<N: RunNotifier>(run_id: &str, notifier: &N, outcome: &NodeOutcome) {
  notifier.notify(RunEvent::NodeFailed {
    run_id: run_id.to_string(),
    node_id: outcome.node_id.clone(),
    error: outcome.failure.clone().unwrap_or_default(),
  });
}
