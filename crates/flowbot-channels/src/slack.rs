//! Slack Events API.
//!
//! Requests are signed with the app's signing secret: HMAC-SHA256 over
//! `v0:{timestamp}:{raw body}`, hex-encoded and prefixed `v0=`. Requests
//! older than five minutes are rejected to stop replays.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, warn};

use flowbot_core::{InboundMessage, Platform};

use crate::adapter::{ChannelAdapter, Delivery, RequestMeta};
use crate::error::ChannelError;

pub const SIGNATURE_HEADER: &str = "X-Slack-Signature";
pub const TIMESTAMP_HEADER: &str = "X-Slack-Request-Timestamp";

const DEFAULT_API_BASE: &str = "https://slack.com/api";
const MAX_SKEW_SECS: u64 = 5 * 60;

type HmacSha256 = Hmac<Sha256>;

pub struct SlackAdapter {
    client: reqwest::Client,
    bot_token: String,
    signing_secret: String,
    api_base: String,
}

impl SlackAdapter {
    pub fn new(bot_token: &str, signing_secret: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            bot_token: bot_token.to_string(),
            signing_secret: signing_secret.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// The `challenge` of a `url_verification` request, which must be
    /// echoed back verbatim when the Events URL is registered.
    pub fn challenge(payload: &serde_json::Value) -> Option<&str> {
        if payload.get("type").and_then(|t| t.as_str()) != Some("url_verification") {
            return None;
        }
        payload.get("challenge").and_then(|c| c.as_str())
    }

    /// Signature check against an explicit clock, in Unix seconds.
    pub fn verify_at(&self, req: &RequestMeta<'_>, now: i64) -> Result<(), ChannelError> {
        let timestamp = req
            .header(TIMESTAMP_HEADER)
            .ok_or_else(|| ChannelError::AuthFailed("missing request timestamp".to_string()))?;
        let signature = req
            .header(SIGNATURE_HEADER)
            .ok_or_else(|| ChannelError::AuthFailed("missing signature".to_string()))?;

        let ts: i64 = timestamp
            .parse()
            .map_err(|_| ChannelError::AuthFailed("malformed request timestamp".to_string()))?;
        if now.abs_diff(ts) > MAX_SKEW_SECS {
            return Err(ChannelError::AuthFailed("request timestamp outside the allowed window".to_string()));
        }

        let expected = signature
            .strip_prefix("v0=")
            .and_then(|hex_sig| hex::decode(hex_sig).ok())
            .ok_or_else(|| ChannelError::AuthFailed("malformed signature".to_string()))?;

        let mut mac = HmacSha256::new_from_slice(self.signing_secret.as_bytes())
            .map_err(|e| ChannelError::AuthFailed(e.to_string()))?;
        mac.update(signature_base(timestamp, req.body()).as_slice());
        mac.verify_slice(&expected)
            .map_err(|_| ChannelError::AuthFailed("signature mismatch".to_string()))
    }
}

/// `v0=`-prefixed signature for a body, as Slack computes it.
pub fn sign(signing_secret: &str, timestamp: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(signing_secret.as_bytes()).expect("HMAC accepts any key size");
    mac.update(&signature_base(timestamp, body));
    format!("v0={}", hex::encode(mac.finalize().into_bytes()))
}

fn signature_base(timestamp: &str, body: &[u8]) -> Vec<u8> {
    let mut base = format!("v0:{timestamp}:").into_bytes();
    base.extend_from_slice(body);
    base
}

#[async_trait]
impl ChannelAdapter for SlackAdapter {
    fn platform(&self) -> Platform {
        Platform::Slack
    }

    fn authenticate(&self, req: &RequestMeta<'_>) -> Result<(), ChannelError> {
        self.verify_at(req, chrono::Utc::now().timestamp())
    }

    fn normalize(&self, payload: &serde_json::Value) -> Result<Option<InboundMessage>, ChannelError> {
        let envelope: Envelope = serde_json::from_value(payload.clone())
            .map_err(|e| ChannelError::InvalidPayload(e.to_string()))?;

        if envelope.kind != "event_callback" {
            debug!(kind = %envelope.kind, "ignoring Slack envelope");
            return Ok(None);
        }
        let Some(event) = envelope.event else {
            return Ok(None);
        };
        if !matches!(event.kind.as_str(), "message" | "app_mention")
            || event.bot_id.is_some()
            || event.subtype.is_some()
        {
            return Ok(None);
        }
        let (Some(user), Some(channel)) = (event.user, event.channel) else {
            return Ok(None);
        };
        let text = strip_mentions(event.text.as_deref().unwrap_or(""));
        if text.is_empty() {
            return Ok(None);
        }

        Ok(Some(InboundMessage {
            message: text.to_string(),
            user_id: user,
            platform: Platform::Slack,
            chat_id: Some(channel),
            user_name: None,
        }))
    }

    async fn deliver(&self, to: &InboundMessage, text: &str) -> Result<Delivery, ChannelError> {
        let channel = to.chat_id.as_deref().unwrap_or(&to.user_id);
        let url = format!("{}/chat.postMessage", self.api_base.trim_end_matches('/'));

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.bot_token)
            .json(&serde_json::json!({ "channel": channel, "text": text }))
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))?;

        let status = resp.status();
        let body: PostMessageResponse = resp
            .json()
            .await
            .map_err(|e| ChannelError::SendFailed(format!("HTTP {status}: {e}")))?;
        if !body.ok {
            let reason = body.error.unwrap_or_else(|| "unknown_error".to_string());
            warn!(%channel, %reason, "Slack: chat.postMessage rejected");
            return Err(ChannelError::SendFailed(reason));
        }
        Ok(Delivery::Sent)
    }
}

/// Drop leading `<@U123>` mentions, as in "@bot how do I ...".
fn strip_mentions(text: &str) -> &str {
    let mut rest = text.trim();
    while let Some(after) = rest.strip_prefix("<@") {
        match after.find('>') {
            Some(end) => rest = after[end + 1..].trim_start(),
            None => break,
        }
    }
    rest
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    event: Option<Event>,
}

#[derive(Deserialize)]
struct Event {
    #[serde(rename = "type")]
    kind: String,
    subtype: Option<String>,
    bot_id: Option<String>,
    user: Option<String>,
    channel: Option<String>,
    text: Option<String>,
}

#[derive(Deserialize)]
struct PostMessageResponse {
    ok: bool,
    error: Option<String>,
}
