use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::provider::{ChatRequest, ChatResponse, CompletionError, LlmProvider};

/// One entry in the fallback chain: a provider and, optionally, the model it
/// should be asked for instead of the one on the request.
pub struct ProviderSlot {
    pub provider: Arc<dyn LlmProvider>,
    pub model: Option<String>,
}

impl ProviderSlot {
    pub fn new(provider: Arc<dyn LlmProvider>, model: Option<String>) -> Self {
        Self { provider, model }
    }
}

/// Tries slots in priority order (index 0 first) and returns the first
/// success. Only the failure of every slot is reported, as the last error.
///
/// Retries within a slot are the provider's business; the router only
/// moves on.
pub struct ProviderRouter {
    slots: Vec<ProviderSlot>,
}

impl ProviderRouter {
    pub fn new(slots: Vec<ProviderSlot>) -> Self {
        Self { slots }
    }

    /// Primary model, then the fallback model, over the same provider.
    pub fn with_model_fallback(
        provider: Arc<dyn LlmProvider>,
        primary: String,
        fallback: Option<String>,
    ) -> Self {
        let mut slots = vec![ProviderSlot::new(Arc::clone(&provider), Some(primary))];
        if let Some(model) = fallback {
            slots.push(ProviderSlot::new(provider, Some(model)));
        }
        Self::new(slots)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[async_trait]
impl LlmProvider for ProviderRouter {
    fn name(&self) -> &str {
        "router"
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, CompletionError> {
        let mut last_err: Option<CompletionError> = None;

        for (index, slot) in self.slots.iter().enumerate() {
            let provider_name = slot.provider.name();
            let result = match &slot.model {
                Some(model) if *model != req.model => {
                    let mut req = req.clone();
                    req.model = model.clone();
                    slot.provider.send(&req).await
                }
                _ => slot.provider.send(req).await,
            };

            match result {
                Ok(resp) => {
                    if index > 0 {
                        info!(
                            provider = %provider_name,
                            model = %resp.model,
                            slot = index,
                            "request served by fallback"
                        );
                    }
                    return Ok(resp);
                }
                Err(e) => {
                    warn!(
                        provider = %provider_name,
                        model = slot.model.as_deref().unwrap_or(&req.model),
                        slot = index,
                        err = %e,
                        "provider send failed, trying next slot"
                    );
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            CompletionError::Unavailable("no completion providers configured".to_string())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Message;
    use std::sync::Mutex;

    struct AlwaysFail;

    #[async_trait]
    impl LlmProvider for AlwaysFail {
        fn name(&self) -> &str {
            "always-fail"
        }
        async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, CompletionError> {
            Err(CompletionError::Unavailable("intentional failure".to_string()))
        }
    }

    /// Fails for one model, answers for any other, and records what it saw.
    struct FailsFor {
        bad_model: &'static str,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmProvider for FailsFor {
        fn name(&self) -> &str {
            "fails-for"
        }
        async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, CompletionError> {
            self.seen.lock().unwrap().push(req.model.clone());
            if req.model == self.bad_model {
                return Err(CompletionError::Api { status: 503, message: "down".to_string() });
            }
            Ok(ChatResponse {
                content: "ok".to_string(),
                model: req.model.clone(),
                tokens_in: 1,
                tokens_out: 1,
                finish_reason: "stop".to_string(),
            })
        }
    }

    fn dummy_request() -> ChatRequest {
        ChatRequest {
            model: "primary".to_string(),
            messages: vec![Message::user("hello")],
            temperature: 0.7,
            max_tokens: 64,
        }
    }

    #[tokio::test]
    async fn falls_back_to_second_model() {
        let provider = Arc::new(FailsFor { bad_model: "primary", seen: Mutex::new(Vec::new()) });
        let router = ProviderRouter::with_model_fallback(
            provider.clone(),
            "primary".to_string(),
            Some("backup".to_string()),
        );

        let resp = router.send(&dummy_request()).await.unwrap();
        assert_eq!(resp.model, "backup");
        assert_eq!(*provider.seen.lock().unwrap(), ["primary", "backup"]);
    }

    #[tokio::test]
    async fn primary_success_skips_fallback() {
        let provider = Arc::new(FailsFor { bad_model: "backup", seen: Mutex::new(Vec::new()) });
        let router = ProviderRouter::with_model_fallback(
            provider.clone(),
            "primary".to_string(),
            Some("backup".to_string()),
        );

        router.send(&dummy_request()).await.unwrap();
        assert_eq!(*provider.seen.lock().unwrap(), ["primary"]);
    }

    #[tokio::test]
    async fn errors_when_all_fail() {
        let router = ProviderRouter::new(vec![
            ProviderSlot::new(Arc::new(AlwaysFail), None),
            ProviderSlot::new(Arc::new(AlwaysFail), None),
        ]);

        let err = router.send(&dummy_request()).await.unwrap_err();
        assert!(matches!(err, CompletionError::Unavailable(_)));
    }

    #[tokio::test]
    async fn empty_router_is_unavailable() {
        let router = ProviderRouter::new(Vec::new());
        assert!(router.is_empty());
        let err = router.send(&dummy_request()).await.unwrap_err();
        assert!(err.to_string().contains("no completion providers"));
    }
}
