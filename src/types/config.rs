//! Configuration for memocall.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::MemoResult;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "memocall.toml";

/// Main configuration for memocall.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Demo command settings.
    #[serde(default)]
    pub demo: DemoConfig,
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

/// Cache settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of entries. 0 keeps every entry until cleared.
    #[serde(default)]
    pub capacity: usize,

    /// Registers the logging hook on caches built from this config.
    #[serde(default = "default_true")]
    pub log_events: bool,
}

impl CacheConfig {
    /// Unbounded cache without hooks.
    pub fn unbounded() -> Self {
        Self {
            capacity: 0,
            log_events: false,
        }
    }

    /// LRU-bounded cache without hooks.
    pub fn bounded(capacity: usize) -> Self {
        Self {
            capacity,
            log_events: false,
        }
    }

    /// Capacity bound, if any.
    pub fn capacity_limit(&self) -> Option<usize> {
        (self.capacity > 0).then_some(self.capacity)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 0,
            log_events: default_true(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Demo command settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    /// Simulated computation time in the stress demo (in milliseconds).
    #[serde(default = "default_compute_delay")]
    pub compute_delay_ms: u64,

    /// Number of concurrent callers in the stress demo.
    #[serde(default = "default_callers")]
    pub callers: usize,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            compute_delay_ms: default_compute_delay(),
            callers: default_callers(),
        }
    }
}

fn default_compute_delay() -> u64 {
    50
}

fn default_callers() -> usize {
    8
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> MemoResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration to a TOML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> MemoResult<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Creates default configuration.
    pub fn default_config() -> Self {
        Self {
            general: GeneralConfig::default(),
            cache: CacheConfig::default(),
            demo: DemoConfig::default(),
        }
    }

    /// Tries to load configuration from current directory or uses default.
    pub fn load_or_default() -> Self {
        Self::load(DEFAULT_CONFIG_FILE).unwrap_or_else(|_| Self::default_config())
    }

    /// Checks values serde cannot restrict.
    pub fn validate(&self) -> MemoResult<()> {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.general.log_level.as_str()) {
            return Err(crate::MemoError::config(format!(
                "unknown log_level '{}'",
                self.general.log_level
            )));
        }
        if !matches!(self.general.log_format.as_str(), "text" | "json") {
            return Err(crate::MemoError::config(format!(
                "unknown log_format '{}'",
                self.general.log_format
            )));
        }
        if self.demo.callers == 0 {
            return Err(crate::MemoError::config("demo.callers must be at least 1"));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();

        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.cache.capacity_limit(), None);
        assert!(config.cache.log_events);
        assert_eq!(config.demo.callers, 8);
    }

    #[test]
    fn test_partial_section() {
        let config: Config = toml::from_str("[cache]\ncapacity = 16\n").unwrap();

        assert_eq!(config.cache.capacity_limit(), Some(16));
        assert!(config.cache.log_events);
        assert_eq!(config.general.log_format, "text");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);

        let mut config = Config::default_config();
        config.cache.capacity = 3;
        config.demo.compute_delay_ms = 5;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.cache, config.cache);
        assert_eq!(loaded.demo.compute_delay_ms, 5);
    }

    #[test]
    fn test_validate_rejects_unknown_level() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[general]\nlog_level = \"loud\"\n").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, crate::MemoError::Config(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = Config::load("/nonexistent/memocall.toml").unwrap_err();
        assert!(matches!(err, crate::MemoError::Io(_)));
    }
}
