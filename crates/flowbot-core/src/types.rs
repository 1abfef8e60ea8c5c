use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{FlowbotError, Result};

/// Identifier of a deployment (one agent activated on one channel).
///
/// New ids are UUIDv7 so rows sort by creation time in logs and SQL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeploymentId(pub String);

impl DeploymentId {
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DeploymentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DeploymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for DeploymentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DeploymentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Messaging surface a deployment is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Telegram,
    Slack,
    Api,
    Widget,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Telegram => "telegram",
            Platform::Slack => "slack",
            Platform::Api => "api",
            Platform::Widget => "widget",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "telegram" => Ok(Platform::Telegram),
            "slack" => Ok(Platform::Slack),
            "api" => Ok(Platform::Api),
            "widget" => Ok(Platform::Widget),
            other => Err(format!("unknown platform: {}", other)),
        }
    }
}

/// Conversation key: one history per (deployment, end user, platform).
///
/// Wire format: `{deployment_id}_{user_id}_{platform}`. This is the key
/// the persistence layer indexes on, so the format must stay stable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationKey(pub String);

impl ConversationKey {
    pub fn new(deployment_id: &DeploymentId, user_id: &str, platform: Platform) -> Self {
        Self(format!("{}_{}_{}", deployment_id, user_id, platform))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message normalised by a channel adapter, ready for the pipeline.
///
/// This is the whole channel boundary contract: adapters produce it from
/// platform payloads and nothing platform-specific travels further.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    pub message: String,
    pub user_id: String,
    pub platform: Platform,
    /// Where the reply goes when it differs from the user (group chats,
    /// Slack channels).
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
}

/// Channel-specific settings for a deployment, keyed by platform.
///
/// Stored as JSON next to the deployment row and validated here, at the
/// adapter boundary, so nothing downstream handles untyped config blobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "platform", rename_all = "lowercase")]
pub enum ChannelConfig {
    Telegram {
        bot_token: String,
        /// Expected value of `X-Telegram-Bot-Api-Secret-Token`, if set when
        /// the webhook was registered.
        #[serde(default)]
        webhook_secret: Option<String>,
    },
    Slack {
        bot_token: String,
        signing_secret: String,
    },
    Api {
        api_key: String,
    },
    Widget {
        /// Origins allowed to embed the widget. Empty means any origin.
        #[serde(default)]
        allowed_origins: Vec<String>,
    },
}

impl ChannelConfig {
    pub fn platform(&self) -> Platform {
        match self {
            ChannelConfig::Telegram { .. } => Platform::Telegram,
            ChannelConfig::Slack { .. } => Platform::Slack,
            ChannelConfig::Api { .. } => Platform::Api,
            ChannelConfig::Widget { .. } => Platform::Widget,
        }
    }

    /// Reject configs with missing credentials.
    pub fn validate(&self) -> Result<()> {
        let missing = |field: &str| FlowbotError::Validation(format!(
            "{} channel requires a non-empty {}",
            self.platform(),
            field
        ));
        match self {
            ChannelConfig::Telegram { bot_token, .. } if bot_token.trim().is_empty() => {
                Err(missing("bot_token"))
            }
            ChannelConfig::Slack { bot_token, .. } if bot_token.trim().is_empty() => {
                Err(missing("bot_token"))
            }
            ChannelConfig::Slack { signing_secret, .. } if signing_secret.trim().is_empty() => {
                Err(missing("signing_secret"))
            }
            ChannelConfig::Api { api_key } if api_key.trim().is_empty() => {
                Err(missing("api_key"))
            }
            _ => Ok(()),
        }
    }
}
