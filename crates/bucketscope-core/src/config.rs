//! Configuration management for bucketscope
//!
//! Handles loading and validation of `bucketscope.toml`. Every section and
//! field is optional; a missing default-location file means all defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::logging::LogConfig;
use crate::profile::AlgorithmKind;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "BUCKETSCOPE_CONFIG";

/// File name probed under the platform config directory.
pub const CONFIG_FILE_NAME: &str = "bucketscope.toml";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub simulation: SimulationConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub logging: LogConfig,
}

/// Where the remote limiter lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL; the algorithm's endpoint path is appended.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8888".to_string()
}

/// Local simulation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Tick cadence in milliseconds
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Session log entries retained
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            history_limit: default_history_limit(),
        }
    }
}

fn default_tick_interval_ms() -> u64 {
    100
}

fn default_history_limit() -> usize {
    50
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Algorithm selector, e.g. `token-bucket`
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            algorithm: default_algorithm(),
        }
    }
}

fn default_algorithm() -> String {
    AlgorithmKind::TokenBucket.as_str().to_string()
}

/// Output format for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pretty => f.write_str("pretty"),
            Self::Json => f.write_str("json"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(format!("unknown log format: {s}. Expected pretty or json")),
        }
    }
}

/// Where the config file would be read from, if anywhere.
///
/// Order: `explicit`, then `$BUCKETSCOPE_CONFIG`, then
/// `<config_dir>/bucketscope/bucketscope.toml`.
#[must_use]
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join("bucketscope").join(CONFIG_FILE_NAME))
}

impl Config {
    /// Load and validate configuration.
    ///
    /// A file named explicitly (argument or env var) must exist; the default
    /// location may be absent.
    pub fn load(explicit: Option<&Path>) -> crate::Result<Self> {
        let named = explicit.is_some() || std::env::var_os(CONFIG_ENV).is_some_and(|p| !p.is_empty());
        let Some(path) = resolve_config_path(explicit) else {
            return Ok(Self::default());
        };

        if !path.exists() {
            if named {
                return Err(ConfigError::FileNotFound(path.display().to_string()).into());
            }
            tracing::debug!(path = %path.display(), "no config file; using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::ReadFailed(path.display().to_string(), e.to_string())
        })?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.remote.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "remote.base_url must start with http:// or https:// (got {url:?})"
            )));
        }
        if !(10..=60_000).contains(&self.simulation.tick_interval_ms) {
            return Err(ConfigError::ValidationError(format!(
                "simulation.tick_interval_ms must be within 10..=60000 (got {})",
                self.simulation.tick_interval_ms
            )));
        }
        if self.simulation.history_limit == 0 {
            return Err(ConfigError::ValidationError(
                "simulation.history_limit must be at least 1".to_string(),
            ));
        }
        if self.session.algorithm.parse::<AlgorithmKind>().is_err() {
            return Err(ConfigError::ValidationError(format!(
                "session.algorithm {:?} is not a known algorithm",
                self.session.algorithm
            )));
        }
        if self.logging.level.parse::<crate::logging::LogLevel>().is_err() {
            return Err(ConfigError::ValidationError(format!(
                "logging.level {:?} is not a known level",
                self.logging.level
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.simulation.tick_interval_ms)
    }
}
