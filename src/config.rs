//! Binding configuration.
//!
//! Configuration can be loaded from:
//! 1. TOML file (`nc4async.toml` in the working directory)
//! 2. Environment variables (with `NC4ASYNC_` prefix)
//!
//! Environment variables override TOML configuration.
//!
//! # Example TOML Configuration
//!
//! ```toml
//! [engine]
//! worker_threads = 8
//! thread_name = "array-io"
//! keep_alive_ms = 5000
//!
//! [logging]
//! filter = "nc4async=debug,nc4async_tasks=debug"
//! format = "json"
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Field |
//! |----------|-------|
//! | `NC4ASYNC_WORKER_THREADS` | `engine.worker_threads` |
//! | `NC4ASYNC_THREAD_NAME` | `engine.thread_name` |
//! | `NC4ASYNC_KEEP_ALIVE_MS` | `engine.keep_alive_ms` |
//! | `NC4ASYNC_LOG` | `logging.filter` |
//! | `NC4ASYNC_LOG_FORMAT` | `logging.format` |

use std::path::Path;

use nc4async_tasks::EngineConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File [`Config::load`] reads when it exists.
pub const DEFAULT_CONFIG_FILE: &str = "nc4async.toml";

/// Main configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Worker pool configuration.
    pub engine: EngineConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line, human-oriented.
    Pretty,
    /// One line per event.
    #[default]
    Compact,
    /// One JSON object per event.
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Parse(format!("unknown log format \"{other}\""))),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directives.
    pub filter: String,

    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "nc4async=info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

impl Config {
    /// Loads configuration from [`DEFAULT_CONFIG_FILE`] if it exists, then
    /// applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the file exists but is not valid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = if let Ok(contents) = std::fs::read_to_string(DEFAULT_CONFIG_FILE) {
            Self::from_toml(&contents)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Loads configuration from `path`, then applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read and
    /// [`ConfigError::Parse`] if it is not valid.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;
        let mut config = Self::from_toml(&contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parses TOML with optional `[engine]` and `[logging]` tables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on invalid TOML or field types.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Applies `NC4ASYNC_*` environment overrides. Unparseable values are
    /// ignored.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from `lookup`, which maps a variable name to its
    /// value.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("NC4ASYNC_WORKER_THREADS") {
            if let Ok(threads) = v.parse() {
                self.engine.worker_threads = threads;
            }
        }
        if let Some(name) = lookup("NC4ASYNC_THREAD_NAME") {
            self.engine.thread_name = name;
        }
        if let Some(v) = lookup("NC4ASYNC_KEEP_ALIVE_MS") {
            if let Ok(ms) = v.parse() {
                self.engine.keep_alive_ms = ms;
            }
        }

        if let Some(filter) = lookup("NC4ASYNC_LOG") {
            self.logging.filter = filter;
        }
        if let Some(v) = lookup("NC4ASYNC_LOG_FORMAT") {
            if let Ok(format) = v.parse() {
                self.logging.format = format;
            }
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// IO error reading configuration file.
    #[error("Failed to read config file '{path}': {error}")]
    Io {
        /// Path to the configuration file.
        path: String,
        /// Error message.
        error: String,
    },

    /// Parse error in configuration.
    #[error("Failed to parse config: {0}")]
    Parse(String),
}
