use serde::{Deserialize, Serialize};

/// Single conversation turn, stored per conversation key.
///
/// `role` is one of `system`, `user`, `assistant`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: i64,
    pub conversation_key: String,
    pub deployment_id: String,
    pub user_id: String,
    pub platform: String,
    pub role: String,
    pub content: String,
    pub model_used: Option<String>,
    pub tokens_in: u32,
    pub tokens_out: u32,
    /// RFC3339 timestamp.
    pub created_at: String,
}

/// Which way a logged message travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inbound => write!(f, "inbound"),
            Self::Outbound => write!(f, "outbound"),
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inbound" => Ok(Self::Inbound),
            "outbound" => Ok(Self::Outbound),
            other => Err(format!("unknown direction: {other}")),
        }
    }
}

/// Audit row for a message entering or leaving a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageLog {
    pub id: i64,
    pub deployment_id: String,
    pub user_id: String,
    pub platform: String,
    pub chat_id: Option<String>,
    pub direction: Direction,
    pub content: String,
    /// Error detail when the outbound reply is a fallback.
    pub error: Option<String>,
    pub elapsed_ms: Option<u64>,
    pub created_at: String,
}
