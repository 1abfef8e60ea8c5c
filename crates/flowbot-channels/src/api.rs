//! Generic HTTP API channel: a JSON request in, the reply in the response.

use async_trait::async_trait;
use serde::Deserialize;

use flowbot_core::{InboundMessage, Platform};

use crate::adapter::{ChannelAdapter, Delivery, RequestMeta};
use crate::error::ChannelError;

pub struct ApiAdapter {
    api_key: String,
}

impl ApiAdapter {
    pub fn new(api_key: &str) -> Self {
        Self { api_key: api_key.to_string() }
    }
}

/// `{"message": ..., "userId": ..., "chatId"?: ..., "userName"?: ...}`.
///
/// Missing fields deserialize as empty so the pipeline reports which one is
/// required.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPayload {
    #[serde(default)]
    message: String,
    #[serde(default)]
    user_id: String,
    chat_id: Option<String>,
    user_name: Option<String>,
}

#[async_trait]
impl ChannelAdapter for ApiAdapter {
    fn platform(&self) -> Platform {
        Platform::Api
    }

    fn authenticate(&self, req: &RequestMeta<'_>) -> Result<(), ChannelError> {
        match req.bearer() {
            Some(token) if token == self.api_key => Ok(()),
            Some(_) => Err(ChannelError::AuthFailed("invalid API key".to_string())),
            None => Err(ChannelError::AuthFailed("missing bearer token".to_string())),
        }
    }

    fn normalize(&self, payload: &serde_json::Value) -> Result<Option<InboundMessage>, ChannelError> {
        let p: ApiPayload = serde_json::from_value(payload.clone())
            .map_err(|e| ChannelError::InvalidPayload(e.to_string()))?;
        Ok(Some(InboundMessage {
            message: p.message,
            user_id: p.user_id,
            platform: Platform::Api,
            chat_id: p.chat_id,
            user_name: p.user_name,
        }))
    }

    async fn deliver(&self, _to: &InboundMessage, text: &str) -> Result<Delivery, ChannelError> {
        Ok(Delivery::Inline(text.to_string()))
    }
}
