use async_trait::async_trait;
use std::sync::Mutex;

use crate::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError};

/// Deterministic in-process provider for tests and local development. Each
/// call pops the next scripted response or error off a queue.
pub struct MockProvider {
    name: String,
    scripted: Mutex<Vec<Result<String, ProviderError>>>,
}

impl MockProvider {
    pub fn new(name: impl Into<String>, scripted_replies: Vec<&str>) -> Self {
        Self {
            name: name.into(),
            scripted: Mutex::new(scripted_replies.into_iter().map(|s| Ok(s.to_string())).rev().collect()),
        }
    }

    pub fn failing(name: impl Into<String>, error: ProviderError) -> Self {
        Self { name: name.into(), scripted: Mutex::new(vec![Err(error)]) }
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let mut scripted = self.scripted.lock().expect("mock provider mutex poisoned");
        let next = scripted.pop().unwrap_or_else(|| Ok("(mock provider out of scripted replies)".to_string()));
        next.map(|content| ChatResponse {
            content,
            model: req.model.clone(),
            tokens_in: 1,
            tokens_out: 1,
            stop_reason: "stop".to_string(),
        })
    }
}
