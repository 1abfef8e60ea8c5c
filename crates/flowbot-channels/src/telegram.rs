//! Telegram Bot API webhooks.
//!
//! Updates arrive as JSON posts; replies go out through `sendMessage`.
//! Telegram caps a message at 4096 characters, so long replies are split.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{Update, UpdateKind};
use tracing::{debug, warn};

use flowbot_core::{InboundMessage, Platform};

use crate::adapter::{ChannelAdapter, Delivery, RequestMeta};
use crate::error::ChannelError;

pub const SECRET_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";

const MESSAGE_LIMIT: usize = 4096;

pub struct TelegramAdapter {
    bot: Bot,
    webhook_secret: Option<String>,
}

impl TelegramAdapter {
    pub fn new(bot_token: &str, webhook_secret: Option<String>) -> Self {
        Self {
            bot: Bot::new(bot_token),
            webhook_secret,
        }
    }
}

#[async_trait]
impl ChannelAdapter for TelegramAdapter {
    fn platform(&self) -> Platform {
        Platform::Telegram
    }

    fn authenticate(&self, req: &RequestMeta<'_>) -> Result<(), ChannelError> {
        let Some(expected) = self.webhook_secret.as_deref() else {
            return Ok(());
        };
        match req.header(SECRET_HEADER) {
            Some(got) if got == expected => Ok(()),
            Some(_) => Err(ChannelError::AuthFailed("secret token mismatch".to_string())),
            None => Err(ChannelError::AuthFailed("missing secret token".to_string())),
        }
    }

    fn normalize(&self, payload: &serde_json::Value) -> Result<Option<InboundMessage>, ChannelError> {
        let update: Update = serde_json::from_value(payload.clone())
            .map_err(|e| ChannelError::InvalidPayload(e.to_string()))?;

        let UpdateKind::Message(msg) = update.kind else {
            debug!(update_id = update.id.0, "ignoring non-message update");
            return Ok(None);
        };
        let Some(from) = msg.from.as_ref() else {
            return Ok(None);
        };
        if from.is_bot {
            return Ok(None);
        }
        let Some(text) = msg.text().filter(|t| !t.trim().is_empty()) else {
            return Ok(None);
        };

        Ok(Some(InboundMessage {
            message: text.to_string(),
            user_id: from.id.0.to_string(),
            platform: Platform::Telegram,
            chat_id: Some(msg.chat.id.0.to_string()),
            user_name: Some(from.first_name.clone()),
        }))
    }

    async fn deliver(&self, to: &InboundMessage, text: &str) -> Result<Delivery, ChannelError> {
        let target = to.chat_id.as_deref().unwrap_or(&to.user_id);
        let chat_id: i64 = target
            .parse()
            .map_err(|_| ChannelError::InvalidPayload(format!("bad chat id: {target}")))?;

        for (i, chunk) in split_message(text, MESSAGE_LIMIT).iter().enumerate() {
            if let Err(e) = self.bot.send_message(ChatId(chat_id), chunk).await {
                warn!(error = %e, chat_id, chunk_index = i, "Telegram: sendMessage failed");
                return Err(ChannelError::SendFailed(e.to_string()));
            }
        }
        Ok(Delivery::Sent)
    }
}

/// Split on line or word boundaries so no piece exceeds `limit` characters.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.chars().count() > limit {
        let hard = rest
            .char_indices()
            .nth(limit)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let window = &rest[..hard];
        let cut = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&i| i > 0)
            .unwrap_or(hard);
        chunks.push(rest[..cut].to_string());
        rest = rest[cut..].trim_start();
    }
    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn update(from_is_bot: bool, text: Option<&str>) -> serde_json::Value {
        let mut message = json!({
            "message_id": 7,
            "date": 1_767_225_600,
            "chat": {"id": 4242, "type": "private", "first_name": "Sam"},
            "from": {"id": 99, "is_bot": from_is_bot, "first_name": "Sam"},
        });
        if let Some(text) = text {
            message["text"] = json!(text);
        }
        json!({"update_id": 1, "message": message})
    }

    #[test]
    fn text_message_is_normalized() {
        let adapter = TelegramAdapter::new("123:abc", None);
        let msg = adapter.normalize(&update(false, Some("hello"))).unwrap().unwrap();
        assert_eq!(msg.message, "hello");
        assert_eq!(msg.user_id, "99");
        assert_eq!(msg.chat_id.as_deref(), Some("4242"));
        assert_eq!(msg.user_name.as_deref(), Some("Sam"));
        assert_eq!(msg.platform, Platform::Telegram);
    }

    #[test]
    fn bots_and_non_text_are_ignored() {
        let adapter = TelegramAdapter::new("123:abc", None);
        assert!(adapter.normalize(&update(true, Some("hi"))).unwrap().is_none());
        assert!(adapter.normalize(&update(false, None)).unwrap().is_none());
    }

    #[test]
    fn garbage_is_invalid() {
        let adapter = TelegramAdapter::new("123:abc", None);
        let err = adapter.normalize(&json!({"nope": true})).unwrap_err();
        assert_eq!(err.code(), "INVALID_PAYLOAD");
    }

    #[test]
    fn secret_token_is_enforced_when_configured() {
        let adapter = TelegramAdapter::new("123:abc", Some("s3cret".to_string()));
        let ok = RequestMeta::new(b"").with_header(SECRET_HEADER, "s3cret");
        let bad = RequestMeta::new(b"").with_header(SECRET_HEADER, "nope");
        assert!(adapter.authenticate(&ok).is_ok());
        assert!(adapter.authenticate(&bad).is_err());
        assert!(adapter.authenticate(&RequestMeta::new(b"")).is_err());

        let open = TelegramAdapter::new("123:abc", None);
        assert!(open.authenticate(&RequestMeta::new(b"")).is_ok());
    }

    #[test]
    fn long_replies_split_on_boundaries() {
        let text = format!("{}\n{}", "a".repeat(30), "b".repeat(30));
        let chunks = split_message(&text, 40);
        assert_eq!(chunks, vec!["a".repeat(30), "b".repeat(30)]);

        let unbroken = "x".repeat(25);
        let chunks = split_message(&unbroken, 10);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));

        assert_eq!(split_message("short", 4096), vec!["short"]);
    }
}
