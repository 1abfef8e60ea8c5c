//! Operator subcommands that manage the deployment registry directly.

use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Subcommand;
use serde::Deserialize;

use flowbot_core::{AgentProfile, ChannelConfig};
use flowbot_deployments::{Deployment, DeploymentManager, DeploymentStatus, SubscriptionStatus};
use flowbot_memory::{MemoryManager, MessageLog};

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP gateway (default).
    Serve,

    /// Register a deployment from a JSON file.
    Deploy {
        /// File holding `{ownerId, name, agent, channel}`.
        #[arg(long)]
        file: String,
    },

    /// List an owner's deployments.
    List {
        #[arg(long)]
        owner: String,
    },

    /// Set a deployment's status: active, paused or suspended.
    Status { id: String, status: String },

    /// Record an owner's subscription state.
    Subscription {
        #[arg(long)]
        owner: String,
        /// active, past_due, canceled or suspended.
        #[arg(long)]
        status: String,
        /// End of the paid period, RFC3339.
        #[arg(long)]
        period_end: String,
    },

    /// Show the latest message logs for a deployment.
    Logs {
        id: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentFile {
    pub owner_id: String,
    pub name: String,
    pub agent: AgentProfile,
    pub channel: ChannelConfig,
}

pub fn deploy(deployments: &DeploymentManager, path: &Path) -> anyhow::Result<Deployment> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    deploy_json(deployments, &raw)
}

pub fn deploy_json(deployments: &DeploymentManager, raw: &str) -> anyhow::Result<Deployment> {
    let file: DeploymentFile = serde_json::from_str(raw).context("invalid deployment file")?;
    Ok(deployments.create(&file.owner_id, &file.name, file.agent, file.channel)?)
}

pub fn set_status(deployments: &DeploymentManager, id: &str, status: &str) -> anyhow::Result<()> {
    let status: DeploymentStatus = status.parse().map_err(anyhow::Error::msg)?;
    deployments.set_status(id, status)?;
    Ok(())
}

pub fn record_subscription(
    deployments: &DeploymentManager,
    owner: &str,
    status: &str,
    period_end: &str,
) -> anyhow::Result<()> {
    let status: SubscriptionStatus = status.parse().map_err(anyhow::Error::msg)?;
    let period_end = DateTime::parse_from_rfc3339(period_end)
        .context("period end must be RFC3339")?
        .with_timezone(&Utc);
    deployments.upsert_subscription(owner, status, period_end)?;
    Ok(())
}

pub fn logs(memory: &MemoryManager, id: &str, limit: usize) -> anyhow::Result<Vec<MessageLog>> {
    Ok(memory.recent_logs(id, limit)?)
}

/// Run a registry command, printing its result as JSON.
pub fn run(command: Command, deployments: &DeploymentManager, memory: &MemoryManager) -> anyhow::Result<()> {
    match command {
        Command::Serve => {}
        Command::Deploy { file } => {
            let dep = deploy(deployments, Path::new(&file))?;
            println!("{}", serde_json::to_string_pretty(&dep)?);
        }
        Command::List { owner } => {
            let deps = deployments.list_for_owner(&owner)?;
            println!("{}", serde_json::to_string_pretty(&deps)?);
        }
        Command::Status { id, status } => set_status(deployments, &id, &status)?,
        Command::Subscription { owner, status, period_end } => {
            record_subscription(deployments, &owner, &status, &period_end)?
        }
        Command::Logs { id, limit } => {
            println!("{}", serde_json::to_string_pretty(&logs(memory, &id, limit)?)?);
        }
    }
    Ok(())
}
