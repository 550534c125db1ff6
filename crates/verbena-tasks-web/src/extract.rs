use std::collections::BTreeMap;

use async_trait::async_trait;
use scraper::{Html, Selector};
use tokio_util::sync::CancellationToken;

use verbena_task::{
  InputSpec, OutputSpec, TaskBehavior, TaskContract, TaskError, TaskInvocation, TaskOutputs,
  ValueType,
};

/// Extracts the text of the first element matching a CSS selector.
pub struct ExtractText;

impl ExtractText {
  pub fn contract() -> TaskContract {
    TaskContract {
      task_type: "extract_text".to_string(),
      inputs: vec![
        InputSpec {
          name: "html".to_string(),
          value_type: ValueType::Html,
          required: true,
        },
        InputSpec {
          name: "selector".to_string(),
          value_type: ValueType::String,
          required: true,
        },
      ],
      outputs: vec![OutputSpec {
        name: "text".to_string(),
        value_type: ValueType::String,
      }],
      credit_cost: 1,
      entry_point: false,
    }
  }
}

#[async_trait]
impl TaskBehavior for ExtractText {
  async fn execute(
    &self,
    invocation: TaskInvocation,
    _cancel: CancellationToken,
  ) -> Result<TaskOutputs, TaskError> {
    let html = invocation.input("html")?;
    let selector_src = invocation.input("selector")?;

    // scraper's DOM types are not Send; keep them scoped to this block
    // so they never live across an await point.
    let text = {
      let selector = Selector::parse(selector_src)
        .map_err(|e| TaskError::failed(format!("invalid selector '{}': {}", selector_src, e)))?;
      let document = Html::parse_document(html);
      let element = document.select(&selector).next().ok_or_else(|| {
        TaskError::failed(format!("no element matched selector '{}'", selector_src))
      })?;
      element.text().collect::<Vec<_>>().join("")
    };

    Ok(BTreeMap::from([(
      "text".to_string(),
      text.trim().to_string(),
    )]))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn invocation(html: &str, selector: &str) -> TaskInvocation {
    TaskInvocation {
      run_id: "run-1".to_string(),
      node_id: "n-1".to_string(),
      inputs: BTreeMap::from([
        ("html".to_string(), html.to_string()),
        ("selector".to_string(), selector.to_string()),
      ]),
    }
  }

  #[tokio::test]
  async fn extracts_first_matching_element() {
    let html = "<html><body><h1> Title </h1><h1>Second</h1></body></html>";
    let outputs = ExtractText
      .execute(invocation(html, "h1"), CancellationToken::new())
      .await
      .unwrap();

    assert_eq!(outputs.get("text").unwrap(), "Title");
  }

  #[tokio::test]
  async fn missing_element_is_a_task_failure() {
    let err = ExtractText
      .execute(invocation("<p>hi</p>", "h1"), CancellationToken::new())
      .await
      .unwrap_err();

    assert!(err.to_string().contains("no element matched"));
  }

  #[tokio::test]
  async fn invalid_selector_is_a_task_failure() {
    let err = ExtractText
      .execute(invocation("<p>hi</p>", ":::"), CancellationToken::new())
      .await
      .unwrap_err();

    assert!(err.to_string().contains("invalid selector"));
  }
}
