//! Configuration management for elastic-utils
//!
//! This module handles loading, parsing, and managing configuration from various sources:
//! - Configuration files (TOML format)
//! - Environment variables
//! - Command-line arguments (applied by the `cli` module)
//!
//! Configuration precedence (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file
//! 4. Default values

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};

/// Environment variable overriding `connection.url`.
pub const ENV_URL: &str = "ELASTIC_UTILS_URL";
/// Environment variable overriding `connection.api_key_id`.
pub const ENV_API_KEY_ID: &str = "ELASTIC_UTILS_API_KEY_ID";
/// Environment variable overriding `connection.api_key`.
pub const ENV_API_KEY: &str = "ELASTIC_UTILS_API_KEY";
/// Environment variable overriding `logging.level`.
pub const ENV_LOG_LEVEL: &str = "ELASTIC_UTILS_LOG_LEVEL";

/// Largest page Elasticsearch serves without raising `index.max_result_window`.
pub const MAX_PAGE_SIZE: usize = 10_000;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Connection configuration
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Retry/backoff configuration
    #[serde(default)]
    pub retry: RetryConfig,

    /// Async search defaults
    #[serde(default)]
    pub search: SearchConfig,

    /// Export defaults
    #[serde(default)]
    pub export: ExportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Cluster base URL
    #[serde(default = "default_url")]
    pub url: String,

    /// API key id (paired with `api_key`)
    #[serde(default)]
    pub api_key_id: Option<String>,

    /// API key secret
    #[serde(default)]
    pub api_key: Option<String>,

    /// Upper bound for any single HTTP request
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// TCP connect timeout
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,
}

/// Retry/backoff configuration for transient failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// First backoff delay
    #[serde(default = "default_min_delay", with = "humantime_serde")]
    pub min_delay: Duration,

    /// Backoff ceiling
    #[serde(default = "default_max_delay", with = "humantime_serde")]
    pub max_delay: Duration,

    /// Randomize delays
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

/// Async search defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// How long the server keeps a submitted search
    #[serde(default = "default_search_keep_alive", with = "humantime_serde")]
    pub keep_alive: Duration,

    /// Server-side wait on submit
    #[serde(default = "default_wait_for", with = "humantime_serde")]
    pub wait_for: Duration,

    /// Client-side poll interval for `wait`
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
}

/// Export defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Hits per page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// PIT keep-alive, renewed on every page
    #[serde(default = "default_export_keep_alive", with = "humantime_serde")]
    pub keep_alive: Duration,

    /// Field used for date filters and the default sort
    #[serde(default = "default_timestamp_field")]
    pub timestamp_field: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// Default value functions
fn default_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_max_retries() -> usize {
    3
}

fn default_min_delay() -> Duration {
    Duration::from_millis(200)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_jitter() -> bool {
    true
}

fn default_search_keep_alive() -> Duration {
    Duration::from_secs(3600)
}

fn default_wait_for() -> Duration {
    Duration::from_secs(1)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_page_size() -> usize {
    1000
}

fn default_export_keep_alive() -> Duration {
    Duration::from_secs(600)
}

fn default_timestamp_field() -> String {
    "@timestamp".to_string()
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

fn default_log_timestamps() -> bool {
    true
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            api_key_id: None,
            api_key: None,
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            min_delay: default_min_delay(),
            max_delay: default_max_delay(),
            jitter: default_jitter(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            keep_alive: default_search_keep_alive(),
            wait_for: default_wait_for(),
            poll_interval: default_poll_interval(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            keep_alive: default_export_keep_alive(),
            timestamp_field: default_timestamp_field(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamps: default_log_timestamps(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// With `None`, the default path is tried and a missing file yields the
    /// defaults. An explicitly named file must exist.
    ///
    /// # Arguments
    /// * `path` - Optional explicit configuration file
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    pub fn load_from_file(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::default_config_path(), false),
        };

        if !explicit && !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::Unreadable {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Apply environment overrides.
    ///
    /// `lookup` resolves a variable name; pass `|k| std::env::var(k).ok()`
    /// in production.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_URL) {
            self.connection.url = url;
        }
        if let Some(id) = lookup(ENV_API_KEY_ID) {
            self.connection.api_key_id = Some(id);
        }
        if let Some(key) = lookup(ENV_API_KEY) {
            self.connection.api_key = Some(key);
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = LogLevel::parse(&level).ok_or_else(|| {
                ConfigError::InvalidValue {
                    field: ENV_LOG_LEVEL.to_string(),
                    value: level.clone(),
                }
            })?;
        }
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// # Returns
    /// * `PathBuf` - `<config_dir>/elastic-utils/config.toml`
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("elastic-utils")
            .join("config.toml")
    }

    /// Validate the configuration
    ///
    /// # Returns
    /// * `Result<()>` - Ok if valid, error otherwise
    pub fn validate(&self) -> Result<()> {
        self.connection.validate_url()?;

        match (&self.connection.api_key_id, &self.connection.api_key) {
            (Some(_), None) => {
                return Err(ConfigError::MissingField("connection.api_key".into()).into());
            }
            (None, Some(_)) => {
                return Err(ConfigError::MissingField("connection.api_key_id".into()).into());
            }
            _ => {}
        }

        if self.export.page_size == 0 || self.export.page_size > MAX_PAGE_SIZE {
            return Err(invalid("export.page_size", self.export.page_size));
        }
        if self.export.keep_alive.is_zero() {
            return Err(invalid("export.keep_alive", "0s"));
        }
        if self.search.keep_alive.is_zero() {
            return Err(invalid("search.keep_alive", "0s"));
        }
        if self.search.poll_interval.is_zero() {
            return Err(invalid("search.poll_interval", "0s"));
        }
        if self.export.timestamp_field.trim().is_empty() {
            return Err(ConfigError::MissingField("export.timestamp_field".into()).into());
        }
        if self.retry.min_delay > self.retry.max_delay {
            return Err(invalid(
                "retry.min_delay",
                humantime::format_duration(self.retry.min_delay),
            ));
        }
        Ok(())
    }

    /// Render the effective configuration as TOML with secrets redacted.
    pub fn to_toml_redacted(&self) -> Result<String> {
        let mut shown = self.clone();
        if shown.connection.api_key.is_some() {
            shown.connection.api_key = Some("********".to_string());
        }
        toml::to_string_pretty(&shown).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }
}

fn invalid(field: &str, value: impl std::fmt::Display) -> crate::error::ElasticError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
    .into()
}

impl ConnectionConfig {
    /// Check the URL has an http(s) scheme and a host.
    pub fn validate_url(&self) -> Result<()> {
        let url = self.url.trim();
        let rest = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"));
        match rest {
            Some(host) if !host.is_empty() && !host.starts_with('/') => Ok(()),
            _ => Err(invalid("connection.url", url)),
        }
    }

    /// Whether both halves of the API key are configured.
    pub fn has_api_key(&self) -> bool {
        self.api_key_id.is_some() && self.api_key.is_some()
    }
}

impl LogLevel {
    /// Parse a level name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "error" => Some(LogLevel::Error),
            "warn" | "warning" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.connection.url, "http://localhost:9200");
        assert_eq!(config.export.page_size, 1000);
        assert_eq!(config.export.keep_alive, Duration::from_secs(600));
        assert_eq!(config.search.keep_alive, Duration::from_secs(3600));
        assert_eq!(config.export.timestamp_field, "@timestamp");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [connection]
            url = "https://es.example.com:9243"

            [export]
            page_size = 500
            keep_alive = "30m"
            "#,
        )
        .unwrap();

        assert_eq!(config.connection.url, "https://es.example.com:9243");
        assert_eq!(config.export.page_size, 500);
        assert_eq!(config.export.keep_alive, Duration::from_secs(1800));
        assert_eq!(config.export.timestamp_field, "@timestamp");
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn test_load_from_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[search]\npoll_interval = \"2s\"").unwrap();

        let config = Config::load_from_file(Some(file.path())).unwrap();
        assert_eq!(config.search.poll_interval, Duration::from_secs(2));
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(Config::load_from_file(Some(&missing)).is_err());
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let err = Config::from_toml_str("[export]\npage_size = \"many\"").unwrap_err();
        assert!(err.to_string().contains("invalid config format"));
    }

    #[test]
    fn test_env_overrides_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_URL, "https://prod:9200"),
            (ENV_API_KEY_ID, "key-id"),
            (ENV_API_KEY, "secret"),
            (ENV_LOG_LEVEL, "DEBUG"),
        ]);
        let mut config = Config::default();
        config
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.connection.url, "https://prod:9200");
        assert!(config.connection.has_api_key());
        assert_eq!(config.logging.level, LogLevel::Debug);
    }

    #[test]
    fn test_env_rejects_unknown_log_level() {
        let mut config = Config::default();
        let result = config.apply_env(|k| (k == ENV_LOG_LEVEL).then(|| "loud".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.export.page_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.export.page_size = MAX_PAGE_SIZE + 1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.connection.url = "localhost:9200".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.connection.api_key_id = Some("id".into());
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retry.min_delay = Duration::from_secs(10);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_redacted_toml_hides_secret() {
        let mut config = Config::default();
        config.connection.api_key_id = Some("key-id".into());
        config.connection.api_key = Some("top-secret".into());

        let rendered = config.to_toml_redacted().unwrap();
        assert!(rendered.contains("key-id"));
        assert!(!rendered.contains("top-secret"));
        assert!(rendered.contains("keep_alive = \"10m\""));
    }
}
