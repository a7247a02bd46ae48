//! Application settings and configuration management

use crate::error::{AppError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an alternative configuration file
pub const CONFIG_PATH_ENV: &str = "SENTIMENT_GATEWAY_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub predictor: PredictorConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Prediction server listener
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Router listener and forwarding behaviour
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouterConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_router_port")]
    pub port: u16,
    /// Upper bound for a single backend invocation
    #[serde(default = "default_invoke_timeout")]
    pub invoke_timeout_ms: u64,
    #[serde(default = "default_traffic_log_path")]
    pub traffic_log_path: PathBuf,
    #[serde(default = "default_true")]
    pub cors_enabled: bool,
}

fn default_router_port() -> u16 {
    8000
}

fn default_invoke_timeout() -> u64 {
    60000
}

fn default_traffic_log_path() -> PathBuf {
    PathBuf::from("prediction_logs.csv")
}

fn default_true() -> bool {
    true
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_router_port(),
            invoke_timeout_ms: default_invoke_timeout(),
            traffic_log_path: default_traffic_log_path(),
            cors_enabled: true,
        }
    }
}

impl RouterConfig {
    pub fn invoke_timeout(&self) -> Duration {
        Duration::from_millis(self.invoke_timeout_ms)
    }
}

/// Hosting service control plane used for deployment discovery
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_hosting_url")]
    pub hosting_url: String,
    /// Substring every candidate deployment name must contain
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,
    #[serde(default = "default_discovery_timeout")]
    pub timeout_ms: u64,
}

fn default_hosting_url() -> String {
    "http://127.0.0.1:9000".to_string()
}

fn default_name_prefix() -> String {
    "sentiment-analysis".to_string()
}

fn default_discovery_timeout() -> u64 {
    10000
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            hosting_url: default_hosting_url(),
            name_prefix: default_name_prefix(),
            timeout_ms: default_discovery_timeout(),
        }
    }
}

impl DiscoveryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Artifact locations and preprocessing parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PredictorConfig {
    /// Candidate directories, searched in order
    #[serde(default = "default_artifact_dirs")]
    pub artifact_dirs: Vec<PathBuf>,
    #[serde(default = "default_model_file")]
    pub model_file: String,
    #[serde(default = "default_tokenizer_file")]
    pub tokenizer_file: String,
    #[serde(default = "default_labels_file")]
    pub labels_file: String,
    /// Sequence length the model was trained with
    #[serde(default = "default_max_len")]
    pub max_len: usize,
}

fn default_artifact_dirs() -> Vec<PathBuf> {
    ["model", "/app/model", "/opt/ml/model"]
        .iter()
        .map(PathBuf::from)
        .collect()
}

fn default_model_file() -> String {
    "model.json".to_string()
}

fn default_tokenizer_file() -> String {
    "tokenizer.json".to_string()
}

fn default_labels_file() -> String {
    "label_encoder.json".to_string()
}

fn default_max_len() -> usize {
    100
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            artifact_dirs: default_artifact_dirs(),
            model_file: default_model_file(),
            tokenizer_file: default_tokenizer_file(),
            labels_file: default_labels_file(),
            max_len: default_max_len(),
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_rps")]
    pub requests_per_second: u32,
    #[serde(default = "default_burst")]
    pub burst_size: u32,
}

fn default_rps() -> u32 {
    100
}

fn default_burst() -> u32 {
    200
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests_per_second: default_rps(),
            burst_size: default_burst(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Settings {
    /// Load settings from the default file (or the one named by
    /// `SENTIMENT_GATEWAY_CONFIG`) and environment variables
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(path)
    }

    /// Load settings from a specific configuration file path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_string_lossy().to_string();
        let config = Config::builder()
            // Load from configuration file
            .add_source(File::with_name(&path).required(false))
            // Override with environment variables (prefixed with SENTIMENT_GATEWAY__)
            .add_source(
                Environment::with_prefix("SENTIMENT_GATEWAY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 || self.router.port == 0 {
            return Err(invalid("Server port cannot be 0"));
        }

        if self.predictor.artifact_dirs.is_empty() {
            return Err(invalid("At least one artifact directory must be configured"));
        }

        if self.predictor.max_len == 0 {
            return Err(invalid("predictor.max_len must be greater than 0"));
        }

        if self.discovery.name_prefix.trim().is_empty() {
            return Err(invalid("discovery.name_prefix cannot be empty"));
        }

        if self.discovery.timeout_ms == 0 || self.router.invoke_timeout_ms == 0 {
            return Err(invalid("Timeouts must be greater than 0"));
        }

        if let Err(e) = reqwest::Url::parse(&self.discovery.hosting_url) {
            return Err(invalid(format!(
                "discovery.hosting_url '{}' is not a valid URL: {}",
                self.discovery.hosting_url, e
            )));
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> AppError {
    AppError::Config(config::ConfigError::Message(message.into()))
}
