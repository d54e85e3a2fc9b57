//! Configuration schema definitions.
//!
//! Configuration is loaded from multiple sources and merged in order:
//!
//! 1. Built-in defaults
//! 2. System config: `/etc/portwatch/config.toml`
//! 3. User config: `~/.config/portwatch/config.toml`
//! 4. Additional config file (via `--config` flag)
//! 5. CLI flags (highest priority)
//!
//! All values are scalars here, so later sources simply override earlier
//! ones when they set a non-default value. Missing files are skipped;
//! invalid TOML fails fast.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use crate::monitor::AddressFamily;

/// Default polling interval in milliseconds.
pub const DEFAULT_INTERVAL_MS: u64 = 5000;

fn default_interval_ms() -> u64 {
    DEFAULT_INTERVAL_MS
}

/// Top-level configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Monitor loop settings.
    #[serde(default)]
    pub monitor: MonitorConfig,
}

impl Config {
    /// Merge another config into this one; non-default scalars override.
    pub fn merge(&mut self, other: Config) {
        self.monitor.merge(other.monitor);
    }

    /// Reject values no scan can run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.monitor.interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "monitor.interval_ms".to_string(),
                message: "polling interval must be a positive number of milliseconds".to_string(),
            });
        }
        Ok(())
    }
}

/// Settings for the polling loop.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitorConfig {
    /// Polling interval in milliseconds. Must be positive.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Address family of the TCP table to scan.
    #[serde(default)]
    pub family: AddressFamily,
}

impl MonitorConfig {
    fn merge(&mut self, other: MonitorConfig) {
        if other.interval_ms != DEFAULT_INTERVAL_MS {
            self.interval_ms = other.interval_ms;
        }
        if other.family != AddressFamily::default() {
            self.family = other.family;
        }
    }

    /// The polling interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            family: AddressFamily::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.monitor.interval_ms, 5000);
        assert_eq!(config.monitor.family, AddressFamily::Ipv4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_merge_overrides_non_default_scalars() {
        let mut base = Config::default();
        let other: Config = toml::from_str(
            r#"
            [monitor]
            interval_ms = 1000
            family = "ipv6"
            "#,
        )
        .unwrap();

        base.merge(other);
        assert_eq!(base.monitor.interval_ms, 1000);
        assert_eq!(base.monitor.family, AddressFamily::Ipv6);
    }

    #[test]
    fn test_merge_keeps_earlier_values_when_omitted() {
        let mut base: Config = toml::from_str(
            r#"
            [monitor]
            interval_ms = 1000
            "#,
        )
        .unwrap();

        base.merge(Config::default());
        assert_eq!(base.monitor.interval_ms, 1000);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config: Config = toml::from_str(
            r#"
            [monitor]
            interval_ms = 0
            "#,
        )
        .unwrap();

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_poll_interval_conversion() {
        let config = MonitorConfig {
            interval_ms: 250,
            family: AddressFamily::Ipv4,
        };
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
    }
}
