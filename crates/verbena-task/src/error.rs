use thiserror::Error;

/// Registry lookup errors.
///
/// A graph referencing an unregistered task type is a configuration bug;
/// the compiler surfaces it before any execution begins.
#[derive(Debug, Error)]
pub enum RegistryError {
  #[error("task type '{0}' is not registered")]
  UnknownTaskType(String),
}

/// A task behavior's failure, captured verbatim in the node's log.
#[derive(Debug, Error)]
pub enum TaskError {
  #[error("{message}")]
  Failed { message: String },

  #[error("task cancelled")]
  Cancelled,
}

impl TaskError {
  /// Build a failure from any displayable reason.
  pub fn failed(message: impl Into<String>) -> Self {
    TaskError::Failed {
      message: message.into(),
    }
  }
}
