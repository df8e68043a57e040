use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

pub const DEFAULT_PORT: u16 = 8089;
pub const DEFAULT_BIND: &str = "127.0.0.1";

/// Hard cap on a single user message's text length, in chars.
pub const MAX_USER_MESSAGE_CHARS: usize = 8_000;

/// Top-level config (`coachengine.toml` + `COACHENGINE_*` env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            database: DatabaseConfig::default(),
            providers: ProvidersConfig::default(),
            concurrency: ConcurrencyConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub sessions_path: String,
    #[serde(default = "default_runtime_config_path")]
    pub runtime_config_path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            sessions_path: default_db_path(),
            runtime_config_path: default_runtime_config_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    pub anthropic: Option<AnthropicConfig>,
    pub openai: Option<OpenAiProviderConfig>,
    /// Additional OpenAI-compatible endpoints, tried as fallback slots in
    /// the order they're declared.
    #[serde(default)]
    pub openai_compat: Vec<OpenAiCompatEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    pub api_key: String,
    #[serde(default = "default_anthropic_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiProviderConfig {
    pub api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiCompatEntry {
    /// Provider identifier, e.g. `"groq"`, `"fireworks"`, or a custom label.
    pub id: String,
    pub api_key: String,
    pub base_url: String,
    #[serde(default = "default_chat_path")]
    pub chat_path: String,
}

/// Bounds on concurrent provider calls and orchestrator retry behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    /// Per-provider semaphore permits.
    #[serde(default = "default_provider_permits")]
    pub provider_permits: usize,
    /// Same-slot retries before the router falls through to a fallback
    /// model: a single retry against the primary.
    #[serde(default = "default_provider_retries")]
    pub provider_max_retries: u32,
    /// Bounded attempts before a compare-and-swap conflict surfaces to the
    /// caller as `Busy` instead of retrying forever.
    #[serde(default = "default_cas_retries")]
    pub max_cas_retries: u32,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            provider_permits: default_provider_permits(),
            provider_max_retries: default_provider_retries(),
            max_cas_retries: default_cas_retries(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com".to_string()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_chat_path() -> String {
    "/v1/chat/completions".to_string()
}
fn default_provider_permits() -> usize {
    8
}
fn default_provider_retries() -> u32 {
    1
}
fn default_cas_retries() -> u32 {
    3
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.coachengine/sessions.db")
}
fn default_runtime_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.coachengine/runtime_config.db")
}

impl EngineConfig {
    /// Load config from a TOML file with `COACHENGINE_*` env var overrides.
    ///
    /// Checks, in order: explicit path argument, then
    /// `~/.coachengine/coachengine.toml`.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path.map(String::from).unwrap_or_else(default_config_path);

        Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("COACHENGINE_").split("_"))
            .extract()
            .map_err(|e| EngineError::Internal(format!("config load failed: {e}")))
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.coachengine/coachengine.toml")
}
