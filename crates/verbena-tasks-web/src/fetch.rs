use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use verbena_task::{
  InputSpec, OutputSpec, TaskBehavior, TaskContract, TaskError, TaskInvocation, TaskOutputs,
  ValueType,
};

/// Fetches a web page and produces its HTML.
///
/// The entry point of the built-in catalog: given a literal URL it needs
/// no upstream data to start a graph.
pub struct FetchPage {
  client: reqwest::Client,
}

impl FetchPage {
  pub fn new() -> Self {
    Self {
      client: reqwest::Client::new(),
    }
  }

  pub fn contract() -> TaskContract {
    TaskContract {
      task_type: "fetch_page".to_string(),
      inputs: vec![InputSpec {
        name: "url".to_string(),
        value_type: ValueType::String,
        required: true,
      }],
      outputs: vec![OutputSpec {
        name: "html".to_string(),
        value_type: ValueType::Html,
      }],
      credit_cost: 2,
      entry_point: true,
    }
  }
}

impl Default for FetchPage {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl TaskBehavior for FetchPage {
  async fn execute(
    &self,
    invocation: TaskInvocation,
    cancel: CancellationToken,
  ) -> Result<TaskOutputs, TaskError> {
    let url = invocation.input("url")?;
    debug!(node_id = %invocation.node_id, url = %url, "fetching page");

    let response = tokio::select! {
      response = self.client.get(url).send() => {
        response.map_err(|e| TaskError::failed(format!("request to '{}' failed: {}", url, e)))?
      }
      _ = cancel.cancelled() => return Err(TaskError::Cancelled),
    };

    let status = response.status();
    if !status.is_success() {
      return Err(TaskError::failed(format!(
        "'{}' returned status {}",
        url, status
      )));
    }

    let html = response
      .text()
      .await
      .map_err(|e| TaskError::failed(format!("reading body of '{}' failed: {}", url, e)))?;

    Ok(BTreeMap::from([("html".to_string(), html)]))
  }
}
