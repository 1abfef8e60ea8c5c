use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use flowbot_agent::{GatewayClient, LlmProvider, ProviderRouter, WorkflowExecutor};
use flowbot_core::config::FlowbotConfig;
use flowbot_deployments::DeploymentManager;
use flowbot_memory::MemoryManager;
use flowbot_scheduler::{SubscriptionSweep, SweepHandle, SweepRunner};

mod app;
mod commands;
mod http;

#[derive(Debug, Parser)]
#[command(name = "flowbot-gateway", version, about = "Workflow chat agents over HTTP")]
struct Cli {
    /// Path to flowbot.toml. Falls back to FLOWBOT_CONFIG, then
    /// ~/.flowbot/flowbot.toml.
    #[arg(long)]
    config: Option<String>,

    /// Override gateway.bind.
    #[arg(long)]
    bind: Option<String>,

    /// Override gateway.port.
    #[arg(long)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<commands::Command>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "flowbot_gateway=info,flowbot_agent=info,flowbot_scheduler=info,tower_http=debug"
                    .into()
            }),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.or_else(|| std::env::var("FLOWBOT_CONFIG").ok());
    let mut config = FlowbotConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        FlowbotConfig::default()
    });
    if let Some(bind) = cli.bind {
        config.gateway.bind = bind;
    }
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }

    // single SQLite file for history, logs and deployments
    let db_path = config.database.path.clone();
    if let Err(e) = ensure_parent_dir(&db_path) {
        warn!(path = %db_path, "failed to create database directory: {e}");
    }
    info!(path = %db_path, "opening SQLite database");

    let db = rusqlite::Connection::open(&db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    flowbot_memory::db::init_db(&db)?;
    flowbot_deployments::db::init_db(&db)?;
    info!("database migrations complete");

    // each manager gets its own connection
    let memory = MemoryManager::new(rusqlite::Connection::open(&db_path)?);
    let deployments = Arc::new(DeploymentManager::new(rusqlite::Connection::open(&db_path)?));

    match cli.command {
        None | Some(commands::Command::Serve) => {}
        Some(command) => return commands::run(command, &deployments, &memory),
    }

    let executor = build_executor(&config);
    let sweeps = start_sweeps(&config, Arc::clone(&deployments));

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    if config.gateway.token.is_none() {
        warn!("gateway.token is not set; dashboard routes are unauthenticated");
    }

    let state = Arc::new(app::AppState::new(config, executor, memory, deployments));
    let router = app::build_router(state);

    info!("Flowbot gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = sweeps {
        handle.stop().await?;
    }
    info!("gateway stopped");
    Ok(())
}

/// Completion client, primary/fallback model chain and executor.
fn build_executor(config: &FlowbotConfig) -> WorkflowExecutor {
    let completion = &config.completion;
    let api_key = completion.resolve_api_key().unwrap_or_else(|| {
        warn!("no completion API key configured; every turn will get the fallback reply");
        String::new()
    });

    let client = GatewayClient::from_config(completion, api_key);
    info!(
        endpoint = client.endpoint(),
        primary = %completion.primary_model,
        fallback = ?completion.fallback_model,
        "completion provider ready"
    );

    let client: Arc<dyn LlmProvider> = Arc::new(client);
    let router = ProviderRouter::with_model_fallback(
        client,
        completion.primary_model.clone(),
        completion.fallback_model.clone(),
    );

    WorkflowExecutor::new(Arc::new(router), completion.primary_model.clone())
        .with_sampling(completion.temperature, completion.max_tokens)
}

fn start_sweeps(config: &FlowbotConfig, deployments: Arc<DeploymentManager>) -> Option<SweepHandle> {
    if !config.sweep.enabled {
        info!("subscription sweep disabled");
        return None;
    }
    let grace = chrono::Duration::hours(config.sweep.grace_hours);
    let runner = SweepRunner::new().register(Arc::new(SubscriptionSweep::new(deployments, grace)));
    Some(runner.start(Duration::from_secs(config.sweep.interval_secs)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

fn ensure_parent_dir(path: &str) -> std::io::Result<()> {
    match Path::new(path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_dir_errors_are_reported() {
        let blocker = std::env::temp_dir().join(format!("flowbot-blocker-{}", std::process::id()));
        std::fs::write(&blocker, b"").unwrap();
        let db = blocker.join("data").join("flowbot.db");

        assert!(ensure_parent_dir(db.to_str().unwrap()).is_err());
        assert!(ensure_parent_dir("flowbot.db").is_ok());

        std::fs::remove_file(&blocker).unwrap();
    }
}
