use async_trait::async_trait;

use flowbot_core::{ChannelConfig, InboundMessage, Platform};

use crate::api::ApiAdapter;
use crate::error::ChannelError;
use crate::slack::SlackAdapter;
use crate::telegram::TelegramAdapter;
use crate::widget::WidgetAdapter;

/// How a reply reached the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Pushed to the platform's API.
    Sent,
    /// To be returned in the HTTP response to the inbound request.
    Inline(String),
}

/// The parts of an HTTP request adapters need to authenticate it.
///
/// Header names are matched case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta<'a> {
    headers: Vec<(&'a str, &'a str)>,
    body: &'a [u8],
}

impl<'a> RequestMeta<'a> {
    pub fn new(body: &'a [u8]) -> Self {
        Self { headers: Vec::new(), body }
    }

    pub fn with_header(mut self, name: &'a str, value: &'a str) -> Self {
        self.headers.push((name, value));
        self
    }

    pub fn header(&self, name: &str) -> Option<&'a str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| *v)
    }

    /// Token from an `Authorization: Bearer ...` header.
    pub fn bearer(&self) -> Option<&'a str> {
        self.header("authorization")
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
    }

    pub fn body(&self) -> &'a [u8] {
        self.body
    }
}

/// One messaging surface.
///
/// The host calls `authenticate`, then `normalize`, runs the pipeline on the
/// result, and hands the reply text to `deliver`.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// Check the request really comes from the platform (or an allowed
    /// client). Runs before the body is parsed.
    fn authenticate(&self, req: &RequestMeta<'_>) -> Result<(), ChannelError>;

    /// Extract the user message. `Ok(None)` means the payload is valid but
    /// carries nothing to answer (bot echoes, edits, joins).
    fn normalize(&self, payload: &serde_json::Value) -> Result<Option<InboundMessage>, ChannelError>;

    async fn deliver(&self, to: &InboundMessage, text: &str) -> Result<Delivery, ChannelError>;
}

/// Build the adapter for a deployment's channel config.
pub fn adapter_for(config: &ChannelConfig) -> Box<dyn ChannelAdapter> {
    match config {
        ChannelConfig::Telegram { bot_token, webhook_secret } => {
            Box::new(TelegramAdapter::new(bot_token, webhook_secret.clone()))
        }
        ChannelConfig::Slack { bot_token, signing_secret } => {
            Box::new(SlackAdapter::new(bot_token, signing_secret))
        }
        ChannelConfig::Api { api_key } => Box::new(ApiAdapter::new(api_key)),
        ChannelConfig::Widget { allowed_origins } => {
            Box::new(WidgetAdapter::new(allowed_origins.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_are_case_insensitive() {
        let meta = RequestMeta::new(b"{}")
            .with_header("Authorization", "Bearer abc ")
            .with_header("X-Slack-Signature", "v0=ff");
        assert_eq!(meta.bearer(), Some("abc"));
        assert_eq!(meta.header("x-slack-signature"), Some("v0=ff"));
        assert_eq!(meta.header("origin"), None);
    }

    #[test]
    fn adapter_matches_config_platform() {
        let configs = [
            ChannelConfig::Telegram { bot_token: "t".into(), webhook_secret: None },
            ChannelConfig::Slack { bot_token: "b".into(), signing_secret: "s".into() },
            ChannelConfig::Api { api_key: "k".into() },
            ChannelConfig::Widget { allowed_origins: Vec::new() },
        ];
        for cfg in &configs {
            assert_eq!(adapter_for(cfg).platform(), cfg.platform());
        }
    }
}
