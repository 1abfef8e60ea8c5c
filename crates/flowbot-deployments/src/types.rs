use serde::{Deserialize, Serialize};

use flowbot_core::{AgentProfile, ChannelConfig, DeploymentId};

/// Lifecycle state of a deployment. Only `Active` deployments take messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Active,
    /// Turned off by its owner.
    Paused,
    /// Turned off by the subscription sweep.
    Suspended,
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Paused => write!(f, "paused"),
            Self::Suspended => write!(f, "suspended"),
        }
    }
}

impl std::str::FromStr for DeploymentStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "suspended" => Ok(Self::Suspended),
            other => Err(format!("unknown deployment status: {other}")),
        }
    }
}

/// An agent activated on one channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub id: DeploymentId,
    pub owner_id: String,
    pub name: String,
    pub status: DeploymentStatus,
    pub agent: AgentProfile,
    pub channel: ChannelConfig,
    /// RFC3339 creation timestamp.
    pub created_at: String,
    /// RFC3339 timestamp of the last update.
    pub updated_at: String,
}

impl Deployment {
    pub fn is_active(&self) -> bool {
        self.status == DeploymentStatus::Active
    }
}

/// Billing state mirrored from the payment processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    PastDue,
    Canceled,
    Suspended,
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::PastDue => write!(f, "past_due"),
            Self::Canceled => write!(f, "canceled"),
            Self::Suspended => write!(f, "suspended"),
        }
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "past_due" => Ok(Self::PastDue),
            "canceled" => Ok(Self::Canceled),
            "suspended" => Ok(Self::Suspended),
            other => Err(format!("unknown subscription status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub owner_id: String,
    pub status: SubscriptionStatus,
    /// RFC3339 (UTC, second precision) end of the paid period.
    pub current_period_end: String,
    pub updated_at: String,
}

/// What one suspension pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuspendReport {
    /// Owners whose subscriptions were suspended in this pass.
    pub owners: Vec<String>,
    /// Number of deployments switched from active to suspended.
    pub deployments: usize,
}

impl SuspendReport {
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty() && self.deployments == 0
    }
}
