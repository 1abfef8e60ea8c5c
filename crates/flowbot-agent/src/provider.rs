use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A single message in a chat completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Map a stored history role. Anything but `assistant` is replayed as
    /// user text, so stored rows never gain system authority.
    pub fn from_stored(role: &str) -> Self {
        match role {
            "assistant" => Role::Assistant,
            _ => Role::User,
        }
    }
}

/// Request to a completion provider. Built fresh for every call.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Response from a completion provider.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub finish_reason: String,
}

/// Common interface for completion backends.
///
/// The HTTP gateway client and the model-fallback router both implement it,
/// and tests substitute scripted providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logging and error messages.
    fn name(&self) -> &str;

    /// Send a non-streaming chat request and wait for the full response.
    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, CompletionError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("completion response contained no choices")]
    EmptyChoices,

    #[error("completion response contained no message content")]
    EmptyContent,

    #[error("completion failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

impl CompletionError {
    /// Rate limits, request timeouts and transport timeouts are worth
    /// another attempt. Everything else fails fast.
    pub fn is_retryable(&self) -> bool {
        match self {
            CompletionError::Api { status, .. } => matches!(status, 408 | 429),
            CompletionError::Http(e) => e.is_timeout(),
            _ => false,
        }
    }
}
