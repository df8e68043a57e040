use std::collections::HashMap;
use std::sync::Arc;

use coachengine_core::model_registry::{ModelRegistry, ProviderTag};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::gateway::{ProviderGateway, ProviderSlot};
use crate::provider::{ChatMessage, ChatRequest, ChatResponse, LlmProvider, ProviderError};

/// Ties model resolution (via the model registry) to dispatch (via the
/// gateway): the orchestrator only ever speaks in logical model codes,
/// never provider-specific identifiers or adapters.
pub struct ModelRouter {
    models: Arc<ModelRegistry>,
    adapters: HashMap<ProviderTag, Arc<dyn LlmProvider>>,
    max_retries_per_model: u32,
    /// One semaphore per provider tag, built once at startup and shared
    /// across every dispatch routed to that provider — this is what
    /// actually bounds concurrent in-flight calls per provider.
    permits: HashMap<ProviderTag, Arc<Semaphore>>,
}

impl ModelRouter {
    pub fn new(
        models: Arc<ModelRegistry>,
        adapters: HashMap<ProviderTag, Arc<dyn LlmProvider>>,
        max_retries_per_model: u32,
        permits_per_provider: usize,
    ) -> Self {
        let permits =
            adapters.keys().map(|tag| (*tag, Arc::new(Semaphore::new(permits_per_provider)))).collect();
        Self { models, adapters, max_retries_per_model, permits }
    }

    /// Resolve `model_code` to a concrete adapter and dispatch, retrying
    /// transient failures on that model's own slot first. If `model_code`
    /// is exhausted or unavailable and `fallback_model_code` is present,
    /// fall through to it as a distinct model (not just a retry) — the
    /// returned logical code tells the caller which one actually served
    /// the request.
    pub async fn dispatch(
        &self,
        model_code: &str,
        fallback_model_code: Option<&str>,
        messages: Vec<ChatMessage>,
        max_tokens: u32,
        temperature: Option<f32>,
        cancel: &CancellationToken,
    ) -> Result<(ChatResponse, String), ProviderError> {
        match self.try_model(model_code, messages.clone(), max_tokens, temperature, cancel).await {
            Ok(resp) => Ok((resp, model_code.to_string())),
            Err(primary_err) => {
                let Some(fallback_code) = fallback_model_code else {
                    return Err(primary_err);
                };
                match self.try_model(fallback_code, messages, max_tokens, temperature, cancel).await {
                    Ok(resp) => Ok((resp, fallback_code.to_string())),
                    Err(_) => Err(primary_err),
                }
            }
        }
    }

    async fn try_model(
        &self,
        model_code: &str,
        messages: Vec<ChatMessage>,
        max_tokens: u32,
        temperature: Option<f32>,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, ProviderError> {
        let slot = self.resolve_slot(model_code)?;
        let gateway = ProviderGateway::new(vec![slot]);
        let request = ChatRequest {
            model: self.provider_model_id(model_code)?,
            messages,
            max_tokens,
            temperature,
        };
        gateway.send(&request, cancel).await
    }

    fn resolve_slot(&self, model_code: &str) -> Result<ProviderSlot, ProviderError> {
        let entry = self
            .models
            .get_active(model_code)
            .ok_or_else(|| ProviderError::Unavailable(format!("model unavailable: {model_code}")))?;
        let adapter = self.adapters.get(&entry.provider_tag).ok_or_else(|| {
            ProviderError::Unavailable(format!("no adapter wired for provider tag {:?}", entry.provider_tag))
        })?;
        let permits = self.permits.get(&entry.provider_tag).ok_or_else(|| {
            ProviderError::Unavailable(format!("no semaphore wired for provider tag {:?}", entry.provider_tag))
        })?;
        Ok(ProviderSlot::new(adapter.clone(), self.max_retries_per_model, permits.clone()))
    }

    fn provider_model_id(&self, model_code: &str) -> Result<String, ProviderError> {
        self.models
            .get_active(model_code)
            .map(|e| e.provider_model_id)
            .ok_or_else(|| ProviderError::Unavailable(format!("model unavailable: {model_code}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockProvider;
    use crate::provider::Role;
    use coachengine_core::model_registry::{Capability, ModelEntry};

    fn registry_with(code: &str, tag: ProviderTag, active: bool) -> Arc<ModelRegistry> {
        registry_with_entries(vec![(code, tag, active)])
    }

    fn registry_with_entries(entries: Vec<(&str, ProviderTag, bool)>) -> Arc<ModelRegistry> {
        Arc::new(ModelRegistry::with_entries(
            entries
                .into_iter()
                .map(|(code, tag, active)| ModelEntry {
                    code: code.to_string(),
                    provider_tag: tag,
                    provider_model_id: format!("{code}-v1"),
                    capabilities: vec![Capability::Chat],
                    active,
                    cost_per_1k_input_usd: None,
                    cost_per_1k_output_usd: None,
                })
                .collect(),
        ))
    }

    #[tokio::test]
    async fn dispatches_to_resolved_adapter() {
        let models = registry_with("primary", ProviderTag::Mock, true);
        let mut adapters: HashMap<ProviderTag, Arc<dyn LlmProvider>> = HashMap::new();
        adapters.insert(ProviderTag::Mock, Arc::new(MockProvider::new("mock", vec!["hello"])));

        let router = ModelRouter::new(models, adapters, 0, 4);
        let (resp, model_used) = router
            .dispatch(
                "primary",
                None,
                vec![ChatMessage { role: Role::User, content: "hi".to_string() }],
                64,
                None,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(resp.content, "hello");
        assert_eq!(model_used, "primary");
    }

    #[tokio::test]
    async fn falls_back_to_distinct_model_on_primary_exhaustion() {
        let models = registry_with_entries(vec![
            ("primary", ProviderTag::Mock, true),
            ("fallback", ProviderTag::OpenAiCompat, true),
        ]);
        let mut adapters: HashMap<ProviderTag, Arc<dyn LlmProvider>> = HashMap::new();
        adapters.insert(
            ProviderTag::Mock,
            Arc::new(MockProvider::failing("primary-mock", ProviderError::Unavailable("down".to_string()))),
        );
        adapters.insert(ProviderTag::OpenAiCompat, Arc::new(MockProvider::new("fallback-mock", vec!["ok"])));

        let router = ModelRouter::new(models, adapters, 0, 4);
        let (resp, model_used) = router
            .dispatch(
                "primary",
                Some("fallback"),
                vec![ChatMessage { role: Role::User, content: "hi".to_string() }],
                64,
                None,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(resp.content, "ok");
        assert_eq!(model_used, "fallback");
    }

    #[tokio::test]
    async fn inactive_model_is_unavailable() {
        let models = registry_with("primary", ProviderTag::Mock, false);
        let adapters: HashMap<ProviderTag, Arc<dyn LlmProvider>> = HashMap::new();
        let router = ModelRouter::new(models, adapters, 0, 4);

        let err = router
            .dispatch(
                "primary",
                None,
                vec![ChatMessage { role: Role::User, content: "hi".to_string() }],
                64,
                None,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable(_)));
    }
}
