//! Verbena Tasks Web
//!
//! The built-in web automation task catalog: fetch a page, extract text
//! by CSS selector, deliver a payload to a webhook. Each task registers a
//! contract plus a [`TaskBehavior`](verbena_task::TaskBehavior); the
//! engine stays agnostic to what any of them actually do.

mod extract;
mod fetch;
mod webhook;

use std::sync::Arc;

use verbena_task::TaskRegistry;

pub use extract::ExtractText;
pub use fetch::FetchPage;
pub use webhook::DeliverWebhook;

/// Build a registry with the full built-in catalog registered.
pub fn builtin_registry() -> TaskRegistry {
  let mut registry = TaskRegistry::new();
  registry.register(FetchPage::contract(), Arc::new(FetchPage::new()));
  registry.register(ExtractText::contract(), Arc::new(ExtractText));
  registry.register(DeliverWebhook::contract(), Arc::new(DeliverWebhook::new()));
  registry
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn catalog_registers_all_tasks() {
    let registry = builtin_registry();
    assert_eq!(registry.len(), 3);
    assert!(registry.contract("fetch_page").unwrap().entry_point);
    assert!(!registry.contract("extract_text").unwrap().entry_point);
    assert!(!registry.contract("deliver_webhook").unwrap().entry_point);
  }
}
