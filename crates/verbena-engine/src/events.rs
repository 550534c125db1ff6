//! Run events and notifiers for observability.
//!
//! Events are emitted while a run executes so callers can observe
//! progress, persist state, or stream status to a UI without the engine
//! knowing about any of that.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RunEvent {
  RunStarted {
    run_id: String,
    workflow_id: String,
  },

  PhaseStarted {
    run_id: String,
    phase: u32,
  },

  NodeStarted {
    run_id: String,
    node_id: String,
    phase: u32,
  },

  NodeCompleted {
    run_id: String,
    node_id: String,
    credits: u32,
  },

  NodeFailed {
    run_id: String,
    node_id: String,
    error: String,
  },

  PhaseCompleted {
    run_id: String,
    phase: u32,
  },

  RunCompleted {
    run_id: String,
    credits_consumed: u32,
  },

  RunFailed {
    run_id: String,
    error: String,
  },
}

/// Trait for receiving run events.
///
/// The engine calls `notify` for each event; implementations decide what
/// to do with them (persist, broadcast, log, ignore).
pub trait RunNotifier: Send + Sync {
  fn notify(&self, event: RunEvent);
}

/// A no-op notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl RunNotifier for NoopNotifier {
  fn notify(&self, _event: RunEvent) {}
}

/// A notifier that forwards events to an unbounded channel.
///
/// Unbounded so a slow consumer never stalls the engine; event volume is
/// a handful per node, so growth stays small in practice.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<RunEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<RunEvent>) -> Self {
    Self { sender }
  }
}

impl RunNotifier for ChannelNotifier {
  fn notify(&self, event: RunEvent) {
    // A dropped receiver just means nobody is watching anymore.
    let _ = self.sender.send(event);
  }
}
