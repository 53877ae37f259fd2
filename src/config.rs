//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::dialect::Dialect;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub planner: PlannerConfig,

    #[serde(default)]
    pub aggregator: AggregatorConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Query planner configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlannerConfig {
    #[serde(default = "default_dialect")]
    pub dialect: Dialect,

    /// Column time filters, buckets and first/last ordering use
    #[serde(default = "default_timestamp_column")]
    pub timestamp_column: String,

    #[serde(default = "default_time_bucket_alias")]
    pub time_bucket_alias: String,
}

fn default_dialect() -> Dialect {
    Dialect::H2
}

fn default_timestamp_column() -> String {
    "timestamp".to_string()
}

fn default_time_bucket_alias() -> String {
    "_timestamp".to_string()
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            dialect: default_dialect(),
            timestamp_column: default_timestamp_column(),
            time_bucket_alias: default_time_bucket_alias(),
        }
    }
}

/// Streaming aggregator configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AggregatorConfig {
    #[serde(default = "default_granularity")]
    pub granularity_ms: i64,

    #[serde(default = "default_flush_interval")]
    pub flush_interval_ms: u64,

    #[serde(default = "default_timestamp_column")]
    pub timestamp_column: String,
}

fn default_granularity() -> i64 {
    10_000 // 10 seconds
}

fn default_flush_interval() -> u64 {
    5000 // 5 seconds
}

impl AggregatorConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            granularity_ms: default_granularity(),
            flush_interval_ms: default_flush_interval(),
            timestamp_column: default_timestamp_column(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("sightline").join("config.toml")),
            Some(PathBuf::from("/etc/sightline/config.toml")),
            Some(PathBuf::from("./sightline.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        // Fall back to environment-only config
        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply `SIGHTLINE_*` overrides read through `var`
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Planner overrides
        if let Some(tag) = var("SIGHTLINE_DIALECT") {
            match Dialect::from_tag(&tag) {
                Ok(dialect) => self.planner.dialect = dialect,
                Err(e) => tracing::warn!("Ignoring SIGHTLINE_DIALECT: {}", e),
            }
        }
        if let Some(column) = var("SIGHTLINE_TIMESTAMP_COLUMN") {
            self.planner.timestamp_column = column.clone();
            self.aggregator.timestamp_column = column;
        }

        // Aggregator overrides
        if let Some(granularity) = var("SIGHTLINE_GRANULARITY_MS") {
            if let Ok(g) = granularity.parse() {
                self.aggregator.granularity_ms = g;
            }
        }
        if let Some(interval) = var("SIGHTLINE_FLUSH_INTERVAL_MS") {
            if let Ok(i) = interval.parse() {
                self.aggregator.flush_interval_ms = i;
            }
        }

        // Logging overrides
        if let Some(level) = var("SIGHTLINE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("SIGHTLINE_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Sightline Configuration
#
# Environment variables override these settings:
# - SIGHTLINE_DIALECT
# - SIGHTLINE_TIMESTAMP_COLUMN
# - SIGHTLINE_GRANULARITY_MS
# - SIGHTLINE_FLUSH_INTERVAL_MS
# - SIGHTLINE_LOG_LEVEL
# - SIGHTLINE_LOG_FORMAT

[planner]
# Target database: h2, mysql or clickhouse
dialect = "h2"

# Column used for time filters, time buckets and first/last ordering
timestamp_column = "timestamp"

# Output name of the time bucket column
time_bucket_alias = "_timestamp"

[aggregator]
# Time bucket width, in the unit of the row timestamps (ms)
granularity_ms = 10000

# How often aggregated rows are flushed (ms)
flush_interval_ms = 5000

# Column carrying each row's timestamp
timestamp_column = "timestamp"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config_file_matches_defaults() {
        let file = write_config(&generate_default_config());
        assert_eq!(Config::load(file.path()).unwrap(), Config::default());
    }

    #[test]
    fn test_partial_config() {
        let file = write_config("[planner]\ndialect = \"clickhouse\"\n\n[aggregator]\ngranularity_ms = 60000\n");
        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.planner.dialect, Dialect::ClickHouse);
        assert_eq!(config.planner.timestamp_column, "timestamp");
        assert_eq!(config.aggregator.granularity_ms, 60_000);
        assert_eq!(config.aggregator.flush_interval(), Duration::from_secs(5));
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_load_errors() {
        let file = write_config("[planner]\ndialect = \"oracle\"\n");
        assert!(matches!(Config::load(file.path()), Err(ConfigError::Parse { .. })));

        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(Config::load(&missing), Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("SIGHTLINE_DIALECT", "MySQL"),
            ("SIGHTLINE_TIMESTAMP_COLUMN", "ts"),
            ("SIGHTLINE_GRANULARITY_MS", "not a number"),
            ("SIGHTLINE_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.planner.dialect, Dialect::MySql);
        assert_eq!(config.planner.timestamp_column, "ts");
        assert_eq!(config.aggregator.timestamp_column, "ts");
        assert_eq!(config.aggregator.granularity_ms, default_granularity());
        assert_eq!(config.logging.format, "json");
    }
}
