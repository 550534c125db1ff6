use thiserror::Error;

/// Errors surfaced by the engine plumbing itself.
///
/// Node-level failures never appear here; they are captured in the
/// [`RunResult`](crate::RunResult) and resolved through the fail-fast
/// policy instead of crashing the driver.
#[derive(Debug, Error)]
pub enum EngineError {
  #[error("internal driver failure: {message}")]
  Internal { message: String },
}
