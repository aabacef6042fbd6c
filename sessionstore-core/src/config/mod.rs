//! Configuration management for the session data store
//!
//! Settings come from defaults, a TOML file or environment variables, and are
//! validated before use.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

mod error;

pub use error::ConfigError;

use crate::logging::{LogConfig, LogLevel};

/// Top level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataStoreConfig {
    /// Session server configuration
    pub server: ServerConfig,

    /// Client data store configuration
    pub client: ClientConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Session server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Push accepted changes to other clients and sync late joiners
    pub content_replication_enabled: bool,
}

/// Client data store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Expected values larger than this many bytes are compared by version
    /// instead of being sent to the server
    pub compare_exchange_payload_threshold: u32,

    /// Time after which an unanswered request yields UnexpectedError
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include timestamps
    pub with_timestamp: bool,

    /// Include target module
    pub with_target: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { content_replication_enabled: true }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            compare_exchange_payload_threshold: 64,
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_timestamp: true,
            with_target: true,
        }
    }
}

impl LoggingConfig {
    /// Convert to the settings used by `logging::init_logging_with_config`.
    pub fn to_log_config(&self) -> Result<LogConfig, ConfigError> {
        let level = LogLevel::from_str(&self.level)
            .ok_or_else(|| ConfigError::ValidationFailed(format!("Invalid log level: {}", self.level)))?;
        Ok(LogConfig::new(level)
            .with_timestamp(self.with_timestamp)
            .with_target(self.with_target)
            .json_format(self.json_format))
    }
}

impl DataStoreConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables follow the pattern: SESSIONSTORE_<SECTION>_<KEY>
    /// Example: SESSIONSTORE_CLIENT_CAS_THRESHOLD=128
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Server config
        if let Ok(enabled) = env::var("SESSIONSTORE_SERVER_CONTENT_REPLICATION") {
            config.server.content_replication_enabled =
                parse_var("SESSIONSTORE_SERVER_CONTENT_REPLICATION", &enabled)?;
        }

        // Client config
        if let Ok(threshold) = env::var("SESSIONSTORE_CLIENT_CAS_THRESHOLD") {
            config.client.compare_exchange_payload_threshold =
                parse_var("SESSIONSTORE_CLIENT_CAS_THRESHOLD", &threshold)?;
        }
        if let Ok(timeout) = env::var("SESSIONSTORE_CLIENT_REQUEST_TIMEOUT_MS") {
            let millis: u64 = parse_var("SESSIONSTORE_CLIENT_REQUEST_TIMEOUT_MS", &timeout)?;
            config.client.request_timeout = Duration::from_millis(millis);
        }

        // Logging config
        if let Ok(level) = env::var("SESSIONSTORE_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(json) = env::var("SESSIONSTORE_LOG_JSON") {
            config.logging.json_format = parse_var("SESSIONSTORE_LOG_JSON", &json)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::FileReadError { path: path.to_path_buf(), source })?;

        let config: Self = toml::from_str(&contents)?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client.request_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "request_timeout must be greater than 0".to_string(),
            ));
        }

        if LogLevel::from_str(&self.logging.level).is_none() {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self)?;

        std::fs::write(path, contents)
            .map_err(|source| ConfigError::FileWriteError { path: path.to_path_buf(), source })?;

        Ok(())
    }
}

fn parse_var<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue { var, reason: format!("{:?}: {}", raw, e) })
}
