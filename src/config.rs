use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub collection: CollectionConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub alert: AlertConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.zeroentropy.dev/v1".to_string()
}
fn default_api_key_env() -> String {
    "ZEROENTROPY_API_KEY".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}

impl ServiceConfig {
    /// Reads the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CollectionConfig {
    #[serde(default = "default_collection_name")]
    pub name: String,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            name: default_collection_name(),
        }
    }
}

fn default_collection_name() -> String {
    "default".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Upper bound on simultaneous add-document calls across all callers.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Total attempts per submission when the service reports a conflict.
    #[serde(default = "default_conflict_attempts")]
    pub conflict_attempts: u32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            conflict_attempts: default_conflict_attempts(),
        }
    }
}

fn default_max_concurrency() -> usize {
    16
}
fn default_conflict_attempts() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    #[serde(default = "default_top_k_docs")]
    pub top_k_docs: u32,
    #[serde(default = "default_top_k_snippets")]
    pub top_k_snippets: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_k_docs: default_top_k_docs(),
            top_k_snippets: default_top_k_snippets(),
        }
    }
}

fn default_top_k_docs() -> u32 {
    5
}
fn default_top_k_snippets() -> u32 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct MonitorConfig {
    #[serde(default = "default_monitor_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_queries")]
    pub queries: Vec<String>,
    /// Alert when the top result's score is strictly greater than this.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Result count requested from each query group while monitoring.
    #[serde(default = "default_monitor_top_k")]
    pub top_k: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            dir: default_monitor_dir(),
            queries: default_queries(),
            threshold: default_threshold(),
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            top_k: default_monitor_top_k(),
        }
    }
}

fn default_monitor_dir() -> PathBuf {
    PathBuf::from("./example")
}
fn default_queries() -> Vec<String> {
    vec!["security vulnerability".to_string()]
}
fn default_threshold() -> f64 {
    0.2
}
fn default_workers() -> usize {
    4
}
fn default_queue_capacity() -> usize {
    256
}
fn default_monitor_top_k() -> u32 {
    1
}

#[derive(Debug, Deserialize, Clone)]
pub struct AlertConfig {
    /// Webhook URL. Takes precedence over `webhook_url_env`.
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_webhook_url_env")]
    pub webhook_url_env: String,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            webhook_url_env: default_webhook_url_env(),
        }
    }
}

fn default_webhook_url_env() -> String {
    "SLACK_WEBHOOK_URL".to_string()
}

impl AlertConfig {
    /// Resolves the webhook URL from the file or the environment.
    pub fn resolved_webhook_url(&self) -> Option<String> {
        self.webhook_url
            .clone()
            .or_else(|| std::env::var(&self.webhook_url_env).ok())
            .filter(|u| !u.trim().is_empty())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Collection used when a request carries no `X-Collection-Name` header.
    #[serde(default)]
    pub default_collection: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            default_collection: None,
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

impl Config {
    /// All-defaults configuration used when no config file exists.
    pub fn minimal() -> Self {
        Self {
            service: ServiceConfig::default(),
            collection: CollectionConfig::default(),
            ingest: IngestConfig::default(),
            query: QueryConfig::default(),
            monitor: MonitorConfig::default(),
            alert: AlertConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Loads `path` if it exists, otherwise falls back to [`Config::minimal`].
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Ok(Config::minimal())
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.service.base_url.trim().is_empty() {
        anyhow::bail!("service.base_url must not be empty");
    }

    if config.collection.name.trim().is_empty() {
        anyhow::bail!("collection.name must not be empty");
    }

    if config.ingest.max_concurrency == 0 {
        anyhow::bail!("ingest.max_concurrency must be > 0");
    }

    if config.ingest.conflict_attempts == 0 {
        anyhow::bail!("ingest.conflict_attempts must be >= 1");
    }

    if config.monitor.workers == 0 {
        anyhow::bail!("monitor.workers must be > 0");
    }

    if config.monitor.queue_capacity == 0 {
        anyhow::bail!("monitor.queue_capacity must be > 0");
    }

    if !config.monitor.threshold.is_finite() {
        anyhow::bail!("monitor.threshold must be a finite number");
    }

    Ok(())
}
