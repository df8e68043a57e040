use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError};

/// A single provider slot: the adapter to call, a retry budget for
/// transient failures on this slot alone, and a semaphore bounding how
/// many in-flight calls this process allows against it concurrently.
pub struct ProviderSlot {
    provider: Arc<dyn LlmProvider>,
    max_retries: u32,
    permits: Arc<Semaphore>,
}

impl ProviderSlot {
    /// `permits` is shared across every dispatch routed to this provider —
    /// callers construct it once (per provider tag) and clone the `Arc` in,
    /// rather than handing each slot its own semaphore.
    pub fn new(provider: Arc<dyn LlmProvider>, max_retries: u32, permits: Arc<Semaphore>) -> Self {
        Self { provider, max_retries, permits }
    }
}

/// Dispatches chat requests across a priority-ordered list of provider
/// slots, retrying transiently-failing slots with backoff before falling
/// through to the next one. Rate-limit responses skip same-slot retries
/// entirely and fall through immediately.
pub struct ProviderGateway {
    slots: Vec<ProviderSlot>,
}

impl ProviderGateway {
    pub fn new(slots: Vec<ProviderSlot>) -> Self {
        assert!(!slots.is_empty(), "ProviderGateway requires at least one provider slot");
        Self { slots }
    }

    pub async fn send(
        &self,
        req: &ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, ProviderError> {
        let mut last_err: Option<ProviderError> = None;

        for slot in &self.slots {
            if cancel.is_cancelled() {
                return Err(ProviderError::Cancelled);
            }

            let _permit = slot.permits.acquire().await.map_err(|_| {
                ProviderError::Unavailable("provider semaphore closed".to_string())
            })?;

            for attempt in 0..=slot.max_retries {
                if cancel.is_cancelled() {
                    return Err(ProviderError::Cancelled);
                }

                let outcome = tokio::select! {
                    result = slot.provider.send(req) => result,
                    _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                };

                match outcome {
                    Ok(resp) => {
                        if attempt > 0 {
                            info!(provider = slot.provider.name(), attempt, "request succeeded after retry");
                        }
                        return Ok(resp);
                    }
                    Err(e) => {
                        warn!(provider = slot.provider.name(), attempt, err = %e, "provider send failed");

                        if e.is_rate_limited() {
                            last_err = Some(e);
                            break;
                        }

                        let is_last_attempt = attempt == slot.max_retries;
                        last_err = Some(e);
                        if !is_last_attempt {
                            tokio::time::sleep(Duration::from_millis(200 * (attempt as u64 + 1))).await;
                        }
                    }
                }
            }

            info!(provider = slot.provider.name(), "provider exhausted, trying next slot");
        }

        Err(last_err.unwrap_or_else(|| ProviderError::Unavailable("all providers failed".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChatMessage, Role};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct AlwaysFail(AtomicUsize);

    #[async_trait]
    impl LlmProvider for AlwaysFail {
        fn name(&self) -> &str {
            "always-fail"
        }
        async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::Unavailable("intentional failure".to_string()))
        }
    }

    struct AlwaysOk;

    #[async_trait]
    impl LlmProvider for AlwaysOk {
        fn name(&self) -> &str {
            "always-ok"
        }
        async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            Ok(ChatResponse {
                content: "ok".to_string(),
                model: req.model.clone(),
                tokens_in: 1,
                tokens_out: 1,
                stop_reason: "stop".to_string(),
            })
        }
    }

    fn dummy_request() -> ChatRequest {
        ChatRequest {
            model: "test-model".to_string(),
            messages: vec![ChatMessage { role: Role::User, content: "hello".to_string() }],
            max_tokens: 64,
            temperature: None,
        }
    }

    #[tokio::test]
    async fn falls_back_to_second_slot_on_failure() {
        let gateway = ProviderGateway::new(vec![
            ProviderSlot::new(Arc::new(AlwaysFail(AtomicUsize::new(0))), 0, Arc::new(Semaphore::new(4))),
            ProviderSlot::new(Arc::new(AlwaysOk), 0, Arc::new(Semaphore::new(4))),
        ]);

        let result = gateway.send(&dummy_request(), &CancellationToken::new()).await;
        assert_eq!(result.unwrap().content, "ok");
    }

    #[tokio::test]
    async fn errors_when_all_slots_fail() {
        let gateway = ProviderGateway::new(vec![
            ProviderSlot::new(Arc::new(AlwaysFail(AtomicUsize::new(0))), 0, Arc::new(Semaphore::new(4))),
            ProviderSlot::new(Arc::new(AlwaysFail(AtomicUsize::new(0))), 0, Arc::new(Semaphore::new(4))),
        ]);

        let result = gateway.send(&dummy_request(), &CancellationToken::new()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn rate_limit_skips_retries_on_same_slot() {
        let counter = Arc::new(AtomicUsize::new(0));
        struct Counting(Arc<AtomicUsize>);
        #[async_trait]
        impl LlmProvider for Counting {
            fn name(&self) -> &str {
                "counting-rate-limited"
            }
            async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::RateLimited { retry_after_ms: 10 })
            }
        }

        let gateway = ProviderGateway::new(vec![ProviderSlot::new(
            Arc::new(Counting(counter.clone())),
            3,
            Arc::new(Semaphore::new(4)),
        )]);

        let _ = gateway.send(&dummy_request(), &CancellationToken::new()).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_short_circuits_before_sending() {
        let token = CancellationToken::new();
        token.cancel();
        let gateway =
            ProviderGateway::new(vec![ProviderSlot::new(Arc::new(AlwaysOk), 0, Arc::new(Semaphore::new(4)))]);

        let result = gateway.send(&dummy_request(), &token).await;
        assert!(matches!(result, Err(ProviderError::Cancelled)));
    }
}
