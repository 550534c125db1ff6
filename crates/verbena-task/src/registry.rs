use std::collections::HashMap;
use std::sync::Arc;

use crate::behavior::TaskBehavior;
use crate::contract::TaskContract;
use crate::error::RegistryError;

/// A contract paired with the behavior that executes it.
#[derive(Clone)]
pub struct RegisteredTask {
  pub contract: TaskContract,
  pub behavior: Arc<dyn TaskBehavior>,
}

/// Static catalog of task types.
///
/// Populated at process start, read-only afterwards. There is no
/// mutation path during execution: compilation and the engine only ever
/// look types up.
#[derive(Default)]
pub struct TaskRegistry {
  tasks: HashMap<String, RegisteredTask>,
}

impl TaskRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a task type. Re-registering a type replaces it.
  pub fn register(&mut self, contract: TaskContract, behavior: Arc<dyn TaskBehavior>) {
    self
      .tasks
      .insert(contract.task_type.clone(), RegisteredTask { contract, behavior });
  }

  /// Look up a registered task by type.
  pub fn get(&self, task_type: &str) -> Result<&RegisteredTask, RegistryError> {
    self
      .tasks
      .get(task_type)
      .ok_or_else(|| RegistryError::UnknownTaskType(task_type.to_string()))
  }

  /// Look up just the contract for a task type.
  pub fn contract(&self, task_type: &str) -> Result<&TaskContract, RegistryError> {
    self.get(task_type).map(|t| &t.contract)
  }

  /// Number of registered task types.
  pub fn len(&self) -> usize {
    self.tasks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.tasks.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;

  use async_trait::async_trait;
  use tokio_util::sync::CancellationToken;

  use super::*;
  use crate::behavior::{TaskInvocation, TaskOutputs};
  use crate::contract::{OutputSpec, ValueType};
  use crate::error::TaskError;

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

  fn sample_contract() -> TaskContract {
    TaskContract {
      task_type: "sample".to_string(),
      inputs: vec![],
      outputs: vec![OutputSpec {
        name: "value".to_string(),
        value_type: ValueType::String,
      }],
      credit_cost: 1,
      entry_point: true,
    }
  }

  #[test]
  fn lookup_returns_registered_task() {
    let mut registry = TaskRegistry::new();
    registry.register(sample_contract(), Arc::new(NoopTask));

    let task = registry.get("sample").unwrap();
    assert_eq!(task.contract.task_type, "sample");
    assert_eq!(registry.contract("sample").unwrap().credit_cost, 1);
  }

  #[test]
  fn lookup_of_unknown_type_fails() {
    let registry = TaskRegistry::new();
    assert!(matches!(
      registry.get("missing"),
      Err(RegistryError::UnknownTaskType(t)) if t == "missing"
    ));
  }
}
