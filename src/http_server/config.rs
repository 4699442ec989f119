//! HTTP Server Configuration
//!
//! Bind address, CORS origins, stream tuning and the demo data generator.
//! Every field has a default, so an empty JSON object is a valid config.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::Severity;
use crate::sync::DEFAULT_WINDOW_SIZE;

/// Configuration load and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Read(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to (default: "0.0.0.0")
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to (default: 8080)
    #[serde(default = "default_port")]
    pub port: u16,

    /// CORS allowed origins; empty means permissive
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Window size when a request omits `size` (default: 30)
    #[serde(default = "default_window_size")]
    pub default_window_size: u64,

    /// Orders inserted at startup when the store is empty (default: 100)
    #[serde(default = "default_seed_count")]
    pub seed_count: usize,

    /// Seconds between random order inserts; 0 disables (default: 5)
    #[serde(default = "default_insert_interval_secs")]
    pub insert_interval_secs: u64,

    /// Seconds between staging cache sweeps; 0 disables (default: 60)
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Seconds between SSE keep-alive comments (default: 15)
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    /// Skip results equal to the previous one on the same stream (default: true)
    #[serde(default = "default_dedupe_unchanged")]
    pub dedupe_unchanged: bool,

    /// Minimum log severity (default: "INFO")
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_window_size() -> u64 {
    DEFAULT_WINDOW_SIZE
}
fn default_seed_count() -> usize {
    100
}
fn default_insert_interval_secs() -> u64 {
    5
}
fn default_sweep_interval_secs() -> u64 {
    60
}
fn default_keep_alive_secs() -> u64 {
    15
}
fn default_dedupe_unchanged() -> bool {
    true
}
fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
            default_window_size: default_window_size(),
            seed_count: default_seed_count(),
            insert_interval_secs: default_insert_interval_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            keep_alive_secs: default_keep_alive_secs(),
            dedupe_unchanged: default_dedupe_unchanged(),
            log_level: default_log_level(),
        }
    }
}

impl ServerConfig {
    /// Load and validate a JSON config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: ServerConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_window_size == 0 {
            return Err(ConfigError::Invalid("default_window_size must be > 0".into()));
        }
        if self.keep_alive_secs == 0 {
            return Err(ConfigError::Invalid("keep_alive_secs must be > 0".into()));
        }
        self.log_severity()?;
        Ok(())
    }

    /// Override the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn log_severity(&self) -> Result<Severity, ConfigError> {
        self.log_level
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("Unknown log_level: '{}'", self.log_level)))
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    /// `None` when the random inserter is disabled
    pub fn insert_interval(&self) -> Option<Duration> {
        (self.insert_interval_secs > 0).then(|| Duration::from_secs(self.insert_interval_secs))
    }

    /// `None` when the staging sweeper is disabled
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }
}
