//! Verbena Engine
//!
//! Drives compiled execution plans to completion. The [`Engine`] owns the
//! run lifecycle: phases execute strictly in ascending order, nodes within
//! a phase run in parallel, and the phase boundary is the only
//! synchronization barrier. Produced values, credit accounting, and the
//! run log live in a per-run execution context that is never shared
//! across runs.
//!
//! Failure policy is fail-fast: the first failed node ends the run after
//! its phase finishes, remaining phases are skipped, and the partial
//! results are preserved in the returned [`RunResult`].

mod context;
mod engine;
mod error;
mod events;
mod executor;
mod result;

pub use engine::{Engine, LiteralOverrides, RunHandle};
pub use error::EngineError;
pub use events::{ChannelNotifier, NoopNotifier, RunEvent, RunNotifier};
pub use result::{LogEntry, LogLevel, NodeRun, NodeStatus, RunResult, RunStatus};
