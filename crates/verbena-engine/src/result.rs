//! Run result types emitted for external persistence.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a single node within a run.
///
/// Transitions are strictly `Created -> Running -> {Completed | Failed}`;
/// `Skipped` is assigned to nodes whose phase never started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
  Created,
  Running,
  Completed,
  Failed,
  Skipped,
}

/// Lifecycle of a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
  Pending,
  Running,
  Completed,
  Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
  Info,
  Error,
}

/// One entry in the append-only run log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
  pub timestamp: DateTime<Utc>,
  pub level: LogLevel,
  pub message: String,
  /// Absent for run-level entries.
  pub node_id: Option<String>,
}

impl LogEntry {
  pub fn info(node_id: Option<&str>, message: impl Into<String>) -> Self {
    Self::new(LogLevel::Info, node_id, message)
  }

  pub fn error(node_id: Option<&str>, message: impl Into<String>) -> Self {
    Self::new(LogLevel::Error, node_id, message)
  }

  fn new(level: LogLevel, node_id: Option<&str>, message: impl Into<String>) -> Self {
    Self {
      timestamp: Utc::now(),
      level,
      message: message.into(),
      node_id: node_id.map(str::to_string),
    }
  }
}

/// Per-node outcome of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRun {
  pub node_id: String,
  pub task_type: String,
  pub phase: u32,
  pub status: NodeStatus,
  /// Inputs as resolved at dispatch time.
  #[serde(default)]
  pub inputs_resolved: BTreeMap<String, String>,
  /// Outputs produced on success; empty on failure or skip.
  #[serde(default)]
  pub outputs: BTreeMap<String, String>,
  pub started_at: Option<DateTime<Utc>>,
  pub completed_at: Option<DateTime<Utc>>,
  /// Credits charged for this node; zero unless it completed.
  pub credits: u32,
  pub failure: Option<String>,
}

/// The full record of one run, preserved regardless of outcome.
///
/// The engine hands this to the external persistence layer; partial
/// results of a failed run are kept, never discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
  pub run_id: String,
  pub workflow_id: String,
  pub status: RunStatus,
  /// Node outcomes ordered by phase, then plan order within a phase.
  pub node_runs: Vec<NodeRun>,
  pub started_at: DateTime<Utc>,
  pub completed_at: DateTime<Utc>,
  /// Sum of the credit costs of all completed nodes.
  pub credits_consumed: u32,
  /// Why the run failed, if it did.
  pub failure: Option<String>,
  pub log: Vec<LogEntry>,
}

impl RunResult {
  /// Look up the outcome for one node.
  pub fn node(&self, node_id: &str) -> Option<&NodeRun> {
    self.node_runs.iter().find(|n| n.node_id == node_id)
  }
}
