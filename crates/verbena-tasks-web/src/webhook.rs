use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use verbena_task::{
  InputSpec, TaskBehavior, TaskContract, TaskError, TaskInvocation, TaskOutputs, ValueType,
};

/// Delivers a payload to a webhook via HTTP POST.
///
/// Produces no outputs; a non-success response is a task failure.
pub struct DeliverWebhook {
  client: reqwest::Client,
}

impl DeliverWebhook {
  pub fn new() -> Self {
    Self {
      client: reqwest::Client::new(),
    }
  }

  pub fn contract() -> TaskContract {
    TaskContract {
      task_type: "deliver_webhook".to_string(),
      inputs: vec![
        InputSpec {
          name: "url".to_string(),
          value_type: ValueType::String,
          required: true,
        },
        InputSpec {
          name: "body".to_string(),
          value_type: ValueType::String,
          required: true,
        },
      ],
      outputs: vec![],
      credit_cost: 1,
      entry_point: false,
    }
  }
}

impl Default for DeliverWebhook {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl TaskBehavior for DeliverWebhook {
  async fn execute(
    &self,
    invocation: TaskInvocation,
    cancel: CancellationToken,
  ) -> Result<TaskOutputs, TaskError> {
    let url = invocation.input("url")?;
    let body = invocation.input("body")?.to_string();
    debug!(node_id = %invocation.node_id, url = %url, "delivering webhook");

    let response = tokio::select! {
      response = self
        .client
        .post(url)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body(body)
        .send() =>
      {
        response.map_err(|e| TaskError::failed(format!("delivery to '{}' failed: {}", url, e)))?
      }
      _ = cancel.cancelled() => return Err(TaskError::Cancelled),
    };

    let status = response.status();
    if !status.is_success() {
      return Err(TaskError::failed(format!(
        "webhook '{}' returned status {}",
        url, status
      )));
    }

    Ok(BTreeMap::new())
  }
}
