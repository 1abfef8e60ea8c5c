use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use flowbot_core::config::{CompletionConfig, REQUEST_TIMEOUT_SECS};

use crate::provider::{ChatRequest, ChatResponse, CompletionError, LlmProvider};

/// How many times a retryable failure is re-attempted, and how long to wait.
///
/// The delay grows linearly: `base_delay * attempt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: flowbot_core::config::DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(flowbot_core::config::DEFAULT_RETRY_BASE_MS),
        }
    }
}

/// Client for an OpenAI-compatible chat-completion gateway (OpenRouter by
/// default).
pub struct GatewayClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    endpoint: String,
    timeout: Duration,
    retry: RetryPolicy,
    referer: Option<String>,
    title: Option<String>,
}

impl GatewayClient {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        let base = base_url.unwrap_or_else(|| flowbot_core::config::DEFAULT_GATEWAY_URL.to_string());
        Self {
            client: reqwest::Client::new(),
            api_key,
            endpoint: join_url(&base, flowbot_core::config::DEFAULT_CHAT_PATH),
            base_url: base,
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
            referer: None,
            title: None,
        }
    }

    pub fn from_config(cfg: &CompletionConfig, api_key: String) -> Self {
        Self::new(api_key, Some(cfg.base_url.clone()))
            .with_chat_path(&cfg.chat_path)
            .with_timeout(Duration::from_secs(cfg.timeout_secs))
            .with_retry(RetryPolicy {
                max_retries: cfg.max_retries,
                base_delay: Duration::from_millis(cfg.retry_base_ms),
            })
            .with_attribution(cfg.referer.clone(), cfg.app_title.clone())
    }

    pub fn with_chat_path(mut self, chat_path: &str) -> Self {
        self.endpoint = join_url(&self.base_url, chat_path);
        self
    }

    /// Timeout for a single attempt. Retries get a fresh budget each.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// `HTTP-Referer` and `X-Title` headers, used by OpenRouter for app rankings.
    pub fn with_attribution(mut self, referer: Option<String>, title: Option<String>) -> Self {
        self.referer = referer;
        self.title = title;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Convenience wrapper returning only the reply text.
    pub async fn complete(&self, req: &ChatRequest) -> Result<String, CompletionError> {
        self.send(req).await.map(|r| r.content)
    }

    async fn attempt(&self, body: &serde_json::Value) -> Result<ChatResponse, CompletionError> {
        let mut builder = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .timeout(self.timeout)
            .json(body);
        if let Some(referer) = &self.referer {
            builder = builder.header("HTTP-Referer", referer);
        }
        if let Some(title) = &self.title {
            builder = builder.header("X-Title", title);
        }

        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;

        if !(200..300).contains(&status) {
            let message = error_message(&text);
            warn!(status, %message, "completion gateway error");
            return Err(CompletionError::Api { status, message });
        }

        let api_resp: ApiResponse =
            serde_json::from_str(&text).map_err(|e| CompletionError::Parse(e.to_string()))?;
        parse_response(api_resp, status)
    }
}

#[async_trait]
impl LlmProvider for GatewayClient {
    fn name(&self) -> &str {
        "gateway"
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, CompletionError> {
        let body = build_request_body(req);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            debug!(model = %req.model, attempt, "sending completion request");

            match self.attempt(&body).await {
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_retryable() => {
                    if attempt > self.retry.max_retries {
                        return Err(CompletionError::RetriesExhausted {
                            attempts: attempt,
                            last: e.to_string(),
                        });
                    }
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        model = %req.model,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        err = %e,
                        "retryable completion failure"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

fn build_request_body(req: &ChatRequest) -> serde_json::Value {
    serde_json::json!({
        "model": req.model,
        "messages": req.messages,
        "temperature": req.temperature,
        "max_tokens": req.max_tokens,
        "stream": false,
    })
}

/// Pull the message out of an `{"error":{"message":...}}` envelope, falling
/// back to the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|e| e.error)
        .and_then(|e| e.message)
        .unwrap_or_else(|| body.to_string())
}

fn parse_response(resp: ApiResponse, status: u16) -> Result<ChatResponse, CompletionError> {
    // Some gateways report upstream failures inside a 200 body.
    if let Some(message) = resp.error.and_then(|e| e.message) {
        return Err(CompletionError::Api { status, message });
    }

    let choice = resp
        .choices
        .into_iter()
        .next()
        .ok_or(CompletionError::EmptyChoices)?;
    let content = choice.message.and_then(|m| m.content).unwrap_or_default();
    if content.trim().is_empty() {
        return Err(CompletionError::EmptyContent);
    }

    Ok(ChatResponse {
        content,
        model: resp.model.unwrap_or_default(),
        tokens_in: resp.usage.as_ref().map(|u| u.prompt_tokens).unwrap_or(0),
        tokens_out: resp.usage.as_ref().map(|u| u.completion_tokens).unwrap_or(0),
        finish_reason: choice.finish_reason.unwrap_or_default(),
    })
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}
