//! Configuration module for gator.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::{GatorError, Result};

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/gator.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file. Empty disables file logging.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/gator.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// What the aggregator does when a poll cycle fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleErrorPolicy {
    /// Stop the aggregator with the cycle's error.
    #[default]
    Abort,
    /// Log the failure and poll again at the next interval.
    Continue,
}

/// Aggregator (scheduler) configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AggregatorConfig {
    /// Seconds between poll cycles.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    /// Failure handling between cycles.
    #[serde(default)]
    pub on_error: CycleErrorPolicy,
}

fn default_interval() -> u64 {
    60
}

impl AggregatorConfig {
    /// Interval between cycles as a `Duration`.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            on_error: CycleErrorPolicy::default(),
        }
    }
}

/// Feed fetcher configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Read timeout in seconds.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    /// Total request timeout in seconds.
    #[serde(default = "default_total_timeout")]
    pub total_timeout_secs: u64,
    /// Maximum number of redirects.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Maximum feed size in bytes.
    #[serde(default = "default_max_feed_size")]
    pub max_feed_size_bytes: u64,
    /// Allow loopback and private network hosts.
    #[serde(default)]
    pub allow_private_hosts: bool,
}

fn default_user_agent() -> String {
    concat!("gator/", env!("CARGO_PKG_VERSION"), " (feed aggregator)").to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_read_timeout() -> u64 {
    20
}

fn default_total_timeout() -> u64 {
    30
}

fn default_max_redirects() -> usize {
    5
}

fn default_max_feed_size() -> u64 {
    5 * 1024 * 1024 // 5MB
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            total_timeout_secs: default_total_timeout(),
            max_redirects: default_max_redirects(),
            max_feed_size_bytes: default_max_feed_size(),
            allow_private_hosts: false,
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Aggregator configuration.
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    /// Fetcher configuration.
    #[serde(default)]
    pub fetcher: FetcherConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(GatorError::Io)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| GatorError::Validation(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `GATOR_DATABASE_PATH`: Override the database path
    /// - `GATOR_LOG_LEVEL`: Override the log level
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("GATOR_DATABASE_PATH") {
            if !path.is_empty() {
                self.database.path = path;
            }
        }
        if let Ok(level) = std::env::var("GATOR_LOG_LEVEL") {
            if !level.is_empty() {
                self.logging.level = level;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.aggregator.interval_secs == 0 {
            return Err(GatorError::Config(
                "aggregator.interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.fetcher.total_timeout_secs == 0 {
            return Err(GatorError::Config(
                "fetcher.total_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.fetcher.user_agent.trim().is_empty() {
            return Err(GatorError::Config(
                "fetcher.user_agent must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse a polling interval such as `30s`, `1m`, `1h30m` or `250ms`.
///
/// A bare number is read as seconds. The result must be non-zero.
pub fn parse_interval(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(GatorError::Validation("empty interval".to_string()));
    }
    if let Ok(secs) = s.parse::<u64>() {
        return non_zero(Duration::from_secs(secs), s);
    }

    let mut total = Duration::ZERO;
    let mut rest = s;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if digits == 0 {
            return Err(invalid_interval(s));
        }
        let value: u64 = rest[..digits].parse().map_err(|_| invalid_interval(s))?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let unit = match &rest[..unit_len] {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(
                value
                    .checked_mul(60)
                    .ok_or_else(|| invalid_interval(s))?,
            ),
            "h" => Duration::from_secs(
                value
                    .checked_mul(3600)
                    .ok_or_else(|| invalid_interval(s))?,
            ),
            _ => return Err(invalid_interval(s)),
        };
        total = total.checked_add(unit).ok_or_else(|| invalid_interval(s))?;
        rest = &rest[unit_len..];
    }

    non_zero(total, s)
}

fn non_zero(d: Duration, s: &str) -> Result<Duration> {
    if d.is_zero() {
        return Err(GatorError::Validation(format!(
            "interval must be greater than zero: {s}"
        )));
    }
    Ok(d)
}

fn invalid_interval(s: &str) -> GatorError {
    GatorError::Validation(format!(
        "invalid interval {s:?}, expected something like 30s, 1m, 1h"
    ))
}
