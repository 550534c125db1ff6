//! The run driver.
//!
//! Sequences the phases of one plan, applies the fail-fast policy, and
//! owns the per-run execution context for the run's lifetime.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use verbena_plan::{ExecutionPlan, PlanNode};
use verbena_task::TaskRegistry;

use crate::context::ExecutionContext;
use crate::error::EngineError;
use crate::events::{NoopNotifier, RunEvent, RunNotifier};
use crate::executor::{NodeOutcome, execute_phase};
use crate::result::{NodeRun, NodeStatus, RunResult, RunStatus};

/// Caller-supplied literal replacements, keyed by node id then input
/// name. Merged over the compiled literals with the override winning per
/// key; used when re-running a saved plan with fresh top-level
/// parameters.
pub type LiteralOverrides = BTreeMap<String, BTreeMap<String, String>>;

/// The phase execution engine.
///
/// Generic over `N: RunNotifier` to allow different observation
/// strategies. Use [`Engine::new`] for a default engine with no-op
/// notifications, or [`Engine::with_notifier`] to observe run events.
pub struct Engine<N: RunNotifier = NoopNotifier> {
  registry: Arc<TaskRegistry>,
  notifier: Arc<N>,
}

impl Engine<NoopNotifier> {
  /// Create an engine that discards run events.
  pub fn new(registry: Arc<TaskRegistry>) -> Self {
    Self::with_notifier(registry, NoopNotifier)
  }
}

impl<N: RunNotifier> Engine<N> {
  /// Create an engine with a custom notifier.
  pub fn with_notifier(registry: Arc<TaskRegistry>, notifier: N) -> Self {
    Self {
      registry,
      notifier: Arc::new(notifier),
    }
  }

  /// Execute a plan to completion and return the full run record.
  ///
  /// Node failures do not surface as errors here; they are captured in
  /// the result and resolved through the fail-fast policy.
  pub async fn run(
    &self,
    plan: &ExecutionPlan,
    overrides: &LiteralOverrides,
    cancel: CancellationToken,
  ) -> RunResult {
    let run_id = uuid::Uuid::new_v4().to_string();
    drive(
      run_id,
      plan,
      overrides,
      &self.registry,
      self.notifier.as_ref(),
      cancel,
    )
    .await
  }

  /// Submit a run and return immediately.
  ///
  /// The driver executes on a background task; the returned handle
  /// carries the run id from the start, so callers can subscribe to
  /// events or poll before the run finishes.
  pub fn submit(&self, plan: ExecutionPlan, overrides: LiteralOverrides) -> RunHandle
  where
    N: 'static,
  {
    let run_id = uuid::Uuid::new_v4().to_string();
    let cancel = CancellationToken::new();

    let registry = self.registry.clone();
    let notifier = self.notifier.clone();
    let task_run_id = run_id.clone();
    let task_cancel = cancel.clone();

    let handle = tokio::spawn(async move {
      drive(
        task_run_id,
        &plan,
        &overrides,
        &registry,
        notifier.as_ref(),
        task_cancel,
      )
      .await
    });

    RunHandle {
      run_id,
      cancel,
      handle,
    }
  }
}

/// A handle to a submitted run.
pub struct RunHandle {
  run_id: String,
  cancel: CancellationToken,
  handle: tokio::task::JoinHandle<RunResult>,
}

impl RunHandle {
  pub fn run_id(&self) -> &str {
    &self.run_id
  }

  /// Signal cooperative cancellation. Nodes already running are allowed
  /// to finish or fail naturally; phases not yet started are skipped.
  pub fn cancel(&self) {
    self.cancel.cancel();
  }

  pub fn is_finished(&self) -> bool {
    self.handle.is_finished()
  }

  /// Wait for the run to finish and take its result.
  pub async fn wait(self) -> Result<RunResult, EngineError> {
    self.handle.await.map_err(|e| EngineError::Internal {
      message: format!("run driver task failed: {}", e),
    })
  }
}

/// Drive one run: phases strictly in ascending order, each phase fully
/// finished before the next starts.
#[instrument(
  name = "run_execute",
  skip_all,
  fields(run_id = %run_id, workflow_id = %plan.workflow_id)
)]
async fn drive<N: RunNotifier>(
  run_id: String,
  plan: &ExecutionPlan,
  overrides: &LiteralOverrides,
  registry: &TaskRegistry,
  notifier: &N,
  cancel: CancellationToken,
) -> RunResult {
  let started_at = Utc::now();
  notifier.notify(RunEvent::RunStarted {
    run_id: run_id.clone(),
    workflow_id: plan.workflow_id.clone(),
  });
  info!(
    phases = plan.phases.len(),
    nodes = plan.node_count(),
    "run_started"
  );

  let mut ctx = ExecutionContext::new();
  let mut node_runs: Vec<NodeRun> = Vec::with_capacity(plan.node_count());
  let mut failure: Option<String> = None;

  for phase in &plan.phases {
    if failure.is_none() && cancel.is_cancelled() {
      warn!(phase = phase.number, "run_cancelled");
      ctx.error(None, "run cancelled, remaining phases skipped");
      failure = Some("run cancelled".to_string());
    }

    // Fail-fast: once a node has failed (or the run was cancelled), no
    // later phase starts and its nodes are marked skipped.
    if failure.is_some() {
      for node in &phase.nodes {
        node_runs.push(skipped_run(node, phase.number));
      }
      continue;
    }

    notifier.notify(RunEvent::PhaseStarted {
      run_id: run_id.clone(),
      phase: phase.number,
    });
    info!(phase = phase.number, nodes = phase.nodes.len(), "phase_started");
    ctx.info(
      None,
      format!(
        "phase {} started with {} node(s)",
        phase.number,
        phase.nodes.len()
      ),
    );

    let outcomes = execute_phase(
      &run_id, phase, registry, &ctx, overrides, &cancel, notifier,
    )
    .await;

    for outcome in outcomes {
      if outcome.status == NodeStatus::Completed {
        for (name, value) in &outcome.outputs {
          ctx.record_output(&outcome.node_id, name, value.clone());
        }
        ctx.add_credits(outcome.credits);
      } else if failure.is_none() {
        failure = Some(format!(
          "node '{}' failed: {}",
          outcome.node_id,
          outcome.failure.as_deref().unwrap_or("unknown reason")
        ));
      }
      node_runs.push(finished_run(outcome, phase.number, &mut ctx));
    }

    notifier.notify(RunEvent::PhaseCompleted {
      run_id: run_id.clone(),
      phase: phase.number,
    });
  }

  let completed_at = Utc::now();
  let credits_consumed = ctx.credits();
  let status = if failure.is_some() {
    RunStatus::Failed
  } else {
    RunStatus::Completed
  };

  match &failure {
    Some(reason) => {
      notifier.notify(RunEvent::RunFailed {
        run_id: run_id.clone(),
        error: reason.clone(),
      });
      error!(error = %reason, "run_failed");
    }
    None => {
      notifier.notify(RunEvent::RunCompleted {
        run_id: run_id.clone(),
        credits_consumed,
      });
      info!(credits = credits_consumed, "run_completed");
    }
  }

  RunResult {
    run_id,
    workflow_id: plan.workflow_id.clone(),
    status,
    node_runs,
    started_at,
    completed_at,
    credits_consumed,
    failure,
    log: ctx.into_log(),
  }
}

/// Fold a node outcome into the run record, moving its log lines into the
/// run log.
fn finished_run(outcome: NodeOutcome, phase: u32, ctx: &mut ExecutionContext) -> NodeRun {
  let NodeOutcome {
    node_id,
    task_type,
    status,
    inputs_resolved,
    outputs,
    started_at,
    completed_at,
    credits,
    failure,
    log,
  } = outcome;

  ctx.extend_log(log);

  NodeRun {
    node_id,
    task_type,
    phase,
    status,
    inputs_resolved,
    outputs,
    started_at: Some(started_at),
    completed_at: Some(completed_at),
    credits,
    failure,
  }
}

fn skipped_run(node: &PlanNode, phase: u32) -> NodeRun {
  NodeRun {
    node_id: node.node_id.clone(),
    task_type: node.task_type.clone(),
    phase,
    status: NodeStatus::Skipped,
    inputs_resolved: BTreeMap::new(),
    outputs: BTreeMap::new(),
    started_at: None,
    completed_at: None,
    credits: 0,
    failure: None,
  }
}
