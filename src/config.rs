//! Service configuration.
//!
//! Loaded from a JSON file. Every field has a default, and a bare JSON array
//! of URLs is accepted as a sources-only config.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::domains::DEFAULT_MAX_LINE_LEN;
use crate::error::ConfigError;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    /// Source list URLs, fetched in this order.
    #[serde(default)]
    pub sources: Vec<String>,

    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,

    #[serde(default)]
    pub refresh: RefreshConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub stats: StatsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RefreshConfig {
    #[serde(default = "default_interval_hours")]
    pub interval_hours: u64,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    #[serde(default = "default_max_line_len")]
    pub max_line_len: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// `tracing` filter directive, overridden by `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// `text` or `json`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StatsConfig {
    /// Zero disables the periodic stats line.
    #[serde(default = "default_log_interval")]
    pub log_interval_seconds: u64,
}

// Defaults
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_snapshot_path() -> PathBuf {
    PathBuf::from("domains.json")
}
fn default_interval_hours() -> u64 {
    24
}
fn default_fetch_timeout() -> u64 {
    30
}
fn default_max_body_bytes() -> usize {
    32 * 1024 * 1024
}
fn default_max_line_len() -> usize {
    DEFAULT_MAX_LINE_LEN
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}
fn default_log_interval() -> u64 {
    300
}

// Keeps `Instant + interval` far from overflow in the scheduler.
const MAX_INTERVAL_HOURS: u64 = 24 * 365;

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            sources: Vec::new(),
            snapshot_path: default_snapshot_path(),
            refresh: RefreshConfig::default(),
            logging: LoggingConfig::default(),
            stats: StatsConfig::default(),
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_hours: default_interval_hours(),
            fetch_timeout_secs: default_fetch_timeout(),
            max_body_bytes: default_max_body_bytes(),
            max_line_len: default_max_line_len(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            log_interval_seconds: default_log_interval(),
        }
    }
}

impl RefreshConfig {
    /// Period between refresh cycles, between one hour and one year.
    pub fn interval(&self) -> Duration {
        let hours = self.interval_hours.clamp(1, MAX_INTERVAL_HOURS);
        Duration::from_secs(hours * 3600)
    }
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub snapshot_path: Option<PathBuf>,
}

impl Config {
    /// Loads the config file, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists but cannot be read or parsed.
    pub async fn load(path: impl AsRef<Path>) -> Result<Option<Self>, ConfigError> {
        let path = path.as_ref();
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        Self::from_json(&contents)
            .map(Some)
            .map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Parses either a full config object or a bare array of source URLs.
    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(contents)?;
        if value.is_array() {
            let sources: Vec<String> = serde_json::from_value(value)?;
            return Ok(Self {
                sources,
                ..Self::default()
            });
        }
        serde_json::from_value(value)
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(host) = overrides.host {
            self.host = host;
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(path) = overrides.snapshot_path {
            self.snapshot_path = path;
        }
    }
}
