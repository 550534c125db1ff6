//! The execute contract task implementations must provide.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;

/// Resolved inputs handed to a task behavior for one node execution.
#[derive(Debug, Clone)]
pub struct TaskInvocation {
  /// Run this invocation belongs to.
  pub run_id: String,
  /// Node being executed.
  pub node_id: String,
  /// Resolved input values, keyed by input name.
  pub inputs: BTreeMap<String, String>,
}

impl TaskInvocation {
  /// Get a resolved input value.
  ///
  /// The engine resolves every required input before dispatch, so a miss
  /// here means the contract declares the input as optional (or the
  /// behavior asked for an undeclared name).
  pub fn input(&self, name: &str) -> Result<&str, TaskError> {
    self
      .inputs
      .get(name)
      .map(String::as_str)
      .ok_or_else(|| TaskError::failed(format!("missing input '{}'", name)))
  }
}

/// Output values produced by a behavior, keyed by output name.
///
/// Must cover every output the contract declares; the engine fails the
/// node otherwise.
pub type TaskOutputs = BTreeMap<String, String>;

/// The uniform execute contract behind which all task logic lives.
///
/// Implementations own their I/O (HTTP calls, parsing, delivery) and are
/// treated by the engine as opaque, possibly-failing, possibly-slow
/// functions. Cancellation is cooperative: the engine never kills a
/// behavior, it only hands it a token to honor.
#[async_trait]
pub trait TaskBehavior: Send + Sync {
  async fn execute(
    &self,
    invocation: TaskInvocation,
    cancel: CancellationToken,
  ) -> Result<TaskOutputs, TaskError>;
}
