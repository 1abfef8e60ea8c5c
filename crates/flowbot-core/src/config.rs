use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8787;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_GATEWAY_URL: &str = "https://openrouter.ai/api";
pub const DEFAULT_CHAT_PATH: &str = "/v1/chat/completions";
pub const DEFAULT_PRIMARY_MODEL: &str = "anthropic/claude-3.5-sonnet";
pub const DEFAULT_FALLBACK_MODEL: &str = "openai/gpt-4o-mini";
pub const REQUEST_TIMEOUT_SECS: u64 = 30; // per attempt, not per call
pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_RETRY_BASE_MS: u64 = 1_000;
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

/// Top-level config (flowbot.toml + FLOWBOT_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowbotConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
}

impl Default for FlowbotConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            completion: CompletionConfig::default(),
            database: DatabaseConfig::default(),
            history: HistoryConfig::default(),
            sweep: SweepConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Bearer token for the dashboard routes (`/api/workflows/*`).
    /// `None` disables the check, for local development only.
    pub token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            token: None,
        }
    }
}

/// Settings for the upstream chat-completion gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    #[serde(default = "default_gateway_url")]
    pub base_url: String,
    #[serde(default = "default_chat_path")]
    pub chat_path: String,
    /// Bearer key. Empty falls back to OPENROUTER_API_KEY / OPENAI_API_KEY.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_primary_model")]
    pub primary_model: String,
    /// Tried once the primary model has failed. `None` disables fallback.
    #[serde(default = "default_fallback_model")]
    pub fallback_model: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
    /// Sent as `HTTP-Referer` (OpenRouter attribution), if set.
    pub referer: Option<String>,
    /// Sent as `X-Title`, if set.
    pub app_title: Option<String>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: default_gateway_url(),
            chat_path: default_chat_path(),
            api_key: String::new(),
            primary_model: default_primary_model(),
            fallback_model: default_fallback_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_base_ms: default_retry_base_ms(),
            referer: None,
            app_title: None,
        }
    }
}

impl CompletionConfig {
    /// The configured key, or the first of the well-known env vars that is set.
    pub fn resolve_api_key(&self) -> Option<String> {
        if !self.api_key.trim().is_empty() {
            return Some(self.api_key.clone());
        }
        ["OPENROUTER_API_KEY", "OPENAI_API_KEY"]
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Number of prior turns sent with each completion request.
    #[serde(default = "default_history_window")]
    pub window: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_HISTORY_WINDOW,
        }
    }
}

/// Subscription-suspension sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_sweep_interval")]
    pub interval_secs: u64,
    /// How long after the end of a billing period a subscription stays usable.
    #[serde(default = "default_grace_hours")]
    pub grace_hours: i64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_sweep_interval(),
            grace_hours: default_grace_hours(),
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_gateway_url() -> String {
    DEFAULT_GATEWAY_URL.to_string()
}
fn default_chat_path() -> String {
    DEFAULT_CHAT_PATH.to_string()
}
fn default_primary_model() -> String {
    DEFAULT_PRIMARY_MODEL.to_string()
}
fn default_fallback_model() -> Option<String> {
    Some(DEFAULT_FALLBACK_MODEL.to_string())
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1000
}
fn default_timeout_secs() -> u64 {
    REQUEST_TIMEOUT_SECS
}
fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}
fn default_retry_base_ms() -> u64 {
    DEFAULT_RETRY_BASE_MS
}
fn default_history_window() -> usize {
    DEFAULT_HISTORY_WINDOW
}
fn default_sweep_interval() -> u64 {
    3600
}
fn default_grace_hours() -> i64 {
    72
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.flowbot/flowbot.db", home)
}

impl FlowbotConfig {
    /// Load config from a TOML file with FLOWBOT_* env var overrides.
    ///
    /// Missing sections and fields fall back to their defaults, so an absent
    /// file yields the default config plus whatever the environment sets.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: FlowbotConfig = Figment::from(Serialized::defaults(FlowbotConfig::default()))
            .merge(Toml::file(&path))
            .merge(Env::prefixed("FLOWBOT_").split("__"))
            .extract()
            .map_err(|e| crate::error::FlowbotError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.flowbot/flowbot.toml", home)
}
