//! Configuration management for dmetrics
//!
//! Sampling, watch and sample-source settings with TOML persistence.

use crate::error::{MetricsError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// dmetrics configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Delta engine options
    #[serde(default)]
    pub sampling: SamplingConfig,
    /// Streaming options
    #[serde(default)]
    pub watch: WatchConfig,
    /// Platform source options
    #[serde(default)]
    pub source: SourceConfig,
}

/// Delta engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Warm-up wait between the bootstrap sample and the first usable one
    #[serde(default = "default_bootstrap_delay")]
    pub bootstrap_delay_ms: u64,
}

/// Watch session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Polling interval in milliseconds. Signed so that invalid values in a
    /// config file are reported instead of failing deserialization.
    #[serde(default = "default_watch_interval")]
    pub interval_ms: i64,
}

/// Sample source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// procfs mount point
    #[serde(default = "default_proc_root")]
    pub proc_root: PathBuf,
    /// sysfs mount point
    #[serde(default = "default_sys_root")]
    pub sys_root: PathBuf,
}

// Default value functions
fn default_bootstrap_delay() -> u64 {
    500
}

fn default_watch_interval() -> i64 {
    1000 // 1 second
}

fn default_proc_root() -> PathBuf {
    PathBuf::from("/proc")
}

fn default_sys_root() -> PathBuf {
    PathBuf::from("/sys")
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            bootstrap_delay_ms: default_bootstrap_delay(),
        }
    }
}

impl SamplingConfig {
    /// Bootstrap warm-up delay as a `Duration`
    pub fn bootstrap_delay(&self) -> Duration {
        Duration::from_millis(self.bootstrap_delay_ms)
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_watch_interval(),
        }
    }
}

impl WatchConfig {
    /// Validated polling interval.
    ///
    /// Returns `MetricsError::InvalidInterval` for zero or negative values.
    pub fn interval(&self) -> Result<Duration> {
        if self.interval_ms <= 0 {
            return Err(MetricsError::InvalidInterval);
        }
        Ok(Duration::from_millis(self.interval_ms as u64))
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            proc_root: default_proc_root(),
            sys_root: default_sys_root(),
        }
    }
}

impl Config {
    /// Get the default configuration directory: `~/.config/dmetrics`
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = std::env::var("HOME")
            .map(|home| PathBuf::from(home).join(".config"))
            .unwrap_or_else(|_| PathBuf::from(".config"));

        Ok(config_dir.join("dmetrics"))
    }

    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_file = Self::default_path()?.join("config.toml");

        if !config_file.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&config_file)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| MetricsError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_dir = Self::default_path()?;
        std::fs::create_dir_all(&config_dir)?;
        self.save_to(&config_dir.join("config.toml"))
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| MetricsError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.sampling.bootstrap_delay_ms, 500);
        assert_eq!(config.watch.interval_ms, 1000);
        assert_eq!(config.source.proc_root, PathBuf::from("/proc"));
        assert_eq!(config.source.sys_root, PathBuf::from("/sys"));
    }

    #[test]
    fn test_default_path_is_under_dot_config() {
        let path = Config::default_path().unwrap();
        assert!(path.ends_with(".config/dmetrics"));
    }

    #[test]
    fn test_interval_validation() {
        let mut watch = WatchConfig::default();
        assert_eq!(watch.interval().unwrap(), Duration::from_secs(1));

        watch.interval_ms = 0;
        assert!(matches!(watch.interval(), Err(MetricsError::InvalidInterval)));

        watch.interval_ms = -5;
        assert!(matches!(watch.interval(), Err(MetricsError::InvalidInterval)));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str("[watch]\ninterval_ms = 250\n").unwrap();
        assert_eq!(config.watch.interval_ms, 250);
        assert_eq!(config.sampling.bootstrap_delay_ms, 500);
    }

    #[test]
    fn test_save_and_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.sampling.bootstrap_delay_ms = 50;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.sampling.bootstrap_delay_ms, 50);
        assert_eq!(loaded.watch.interval_ms, 1000);
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[watch\ninterval_ms = ").unwrap();
        assert!(matches!(Config::load_from(&path), Err(MetricsError::Config(_))));
    }
}
