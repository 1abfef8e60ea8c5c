//! Embeddable website widget. Visitors are anonymous; the widget script
//! keeps a stable visitor id in local storage.

use async_trait::async_trait;
use serde::Deserialize;

use flowbot_core::{InboundMessage, Platform};

use crate::adapter::{ChannelAdapter, Delivery, RequestMeta};
use crate::error::ChannelError;

pub struct WidgetAdapter {
    allowed_origins: Vec<String>,
}

impl WidgetAdapter {
    /// An empty list allows every origin.
    pub fn new(allowed_origins: Vec<String>) -> Self {
        Self { allowed_origins }
    }

    fn origin_allowed(&self, origin: &str) -> bool {
        let origin = origin.trim_end_matches('/');
        self.allowed_origins
            .iter()
            .any(|o| o.trim_end_matches('/').eq_ignore_ascii_case(origin))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WidgetPayload {
    #[serde(default)]
    message: String,
    #[serde(default)]
    visitor_id: String,
    name: Option<String>,
}

#[async_trait]
impl ChannelAdapter for WidgetAdapter {
    fn platform(&self) -> Platform {
        Platform::Widget
    }

    fn authenticate(&self, req: &RequestMeta<'_>) -> Result<(), ChannelError> {
        if self.allowed_origins.is_empty() {
            return Ok(());
        }
        match req.header("origin") {
            Some(origin) if self.origin_allowed(origin) => Ok(()),
            Some(origin) => Err(ChannelError::AuthFailed(format!("origin not allowed: {origin}"))),
            None => Err(ChannelError::AuthFailed("missing Origin header".to_string())),
        }
    }

    fn normalize(&self, payload: &serde_json::Value) -> Result<Option<InboundMessage>, ChannelError> {
        let p: WidgetPayload = serde_json::from_value(payload.clone())
            .map_err(|e| ChannelError::InvalidPayload(e.to_string()))?;
        Ok(Some(InboundMessage {
            message: p.message,
            user_id: p.visitor_id,
            platform: Platform::Widget,
            chat_id: None,
            user_name: p.name,
        }))
    }

    async fn deliver(&self, _to: &InboundMessage, text: &str) -> Result<Delivery, ChannelError> {
        Ok(Delivery::Inline(text.to_string()))
    }
}
