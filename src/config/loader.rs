//! Configuration loading with hierarchy merging.
//!
//! Missing config files are not errors, they are simply skipped; a missing
//! file named explicitly with `--config` is an error, and so is invalid TOML
//! anywhere (fail fast with a clear message).

use std::fs;
use std::path::PathBuf;

use tracing::debug;

use super::error::ConfigError;
use super::schema::Config;
use crate::cli::Cli;

/// System-wide configuration path.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/portwatch/config.toml";

/// User configuration directory name.
pub const USER_CONFIG_DIR: &str = "portwatch";

/// User configuration filename.
pub const USER_CONFIG_FILE: &str = "config.toml";

/// Configuration loader with support for hierarchy merging.
pub struct ConfigLoader {
    system_path: PathBuf,
    user_path: PathBuf,
}

impl ConfigLoader {
    /// Create a loader with the default system and user paths.
    #[must_use]
    pub fn new() -> Self {
        let user_config_dir = dirs::config_dir()
            .map(|p| p.join(USER_CONFIG_DIR))
            .unwrap_or_else(|| PathBuf::from(".config").join(USER_CONFIG_DIR));

        Self {
            system_path: PathBuf::from(SYSTEM_CONFIG_PATH),
            user_path: user_config_dir.join(USER_CONFIG_FILE),
        }
    }

    /// Create a loader with custom paths (for testing).
    #[must_use]
    pub fn with_paths(system_path: PathBuf, user_path: PathBuf) -> Self {
        Self {
            system_path,
            user_path,
        }
    }

    /// Load and merge configuration from all sources, then validate.
    pub fn load(&self, cli: &Cli) -> Result<Config, ConfigError> {
        let mut config = Config::default();
        debug!("Loaded built-in default configuration");

        if let Some(system_config) = self.load_file(&self.system_path)? {
            config.merge(system_config);
            debug!("Loaded system config from {:?}", self.system_path);
        } else {
            debug!("No system config found at {:?}", self.system_path);
        }

        if let Some(user_config) = self.load_file(&self.user_path)? {
            config.merge(user_config);
            debug!("Loaded user config from {:?}", self.user_path);
        } else {
            debug!("No user config found at {:?}", self.user_path);
        }

        if let Some(ref cli_config_path) = cli.config {
            match self.load_file(cli_config_path)? {
                Some(cli_config) => {
                    config.merge(cli_config);
                    debug!("Loaded additional config from {:?}", cli_config_path);
                }
                None => {
                    // Unlike system/user config, a missing CLI-specified
                    // config is an error.
                    return Err(ConfigError::ReadError {
                        path: cli_config_path.clone(),
                        source: std::io::Error::new(
                            std::io::ErrorKind::NotFound,
                            "Specified config file not found",
                        ),
                    });
                }
            }
        }

        if let Some(interval_ms) = cli.interval_override() {
            config.monitor.interval_ms = interval_ms;
            debug!(interval_ms, "Applied polling interval from CLI flag");
        }

        config.validate()?;
        Ok(config)
    }

    /// Load a config file, returning None if it doesn't exist.
    fn load_file(&self, path: &PathBuf) -> Result<Option<Config>, ConfigError> {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let config: Config =
                    toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
                        path: path.clone(),
                        source: e,
                    })?;
                Ok(Some(config))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ConfigError::ReadError {
                path: path.clone(),
                source: e,
            }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Commands;
    use crate::monitor::AddressFamily;
    use tempfile::tempdir;

    fn list_cli() -> Cli {
        Cli {
            command: Commands::List,
            config: None,
            verbose: 0,
        }
    }

    fn watch_cli(interval_ms: Option<u64>) -> Cli {
        Cli {
            command: Commands::Watch { interval_ms },
            config: None,
            verbose: 0,
        }
    }

    #[test]
    fn test_missing_files_use_defaults() {
        let dir = tempdir().unwrap();
        let loader = ConfigLoader::with_paths(
            dir.path().join("nonexistent_system.toml"),
            dir.path().join("nonexistent_user.toml"),
        );

        let config = loader.load(&list_cli()).unwrap();

        assert_eq!(config.monitor.interval_ms, 5000);
        assert_eq!(config.monitor.family, AddressFamily::Ipv4);
    }

    #[test]
    fn test_user_config_overrides_system() {
        let dir = tempdir().unwrap();

        fs::write(
            dir.path().join("system.toml"),
            "[monitor]\ninterval_ms = 3000\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("user.toml"),
            "[monitor]\ninterval_ms = 1500\n",
        )
        .unwrap();

        let loader = ConfigLoader::with_paths(
            dir.path().join("system.toml"),
            dir.path().join("user.toml"),
        );

        let config = loader.load(&list_cli()).unwrap();
        assert_eq!(config.monitor.interval_ms, 1500);
    }

    #[test]
    fn test_user_config_omission_keeps_system_value() {
        let dir = tempdir().unwrap();

        fs::write(
            dir.path().join("system.toml"),
            "[monitor]\ninterval_ms = 3000\n",
        )
        .unwrap();
        fs::write(dir.path().join("user.toml"), "[monitor]\nfamily = \"ipv6\"\n").unwrap();

        let loader = ConfigLoader::with_paths(
            dir.path().join("system.toml"),
            dir.path().join("user.toml"),
        );

        let config = loader.load(&list_cli()).unwrap();
        assert_eq!(config.monitor.interval_ms, 3000);
        assert_eq!(config.monitor.family, AddressFamily::Ipv6);
    }

    #[test]
    fn test_cli_config_file_has_highest_file_priority() {
        let dir = tempdir().unwrap();

        fs::write(
            dir.path().join("user.toml"),
            "[monitor]\ninterval_ms = 1500\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("extra.toml"),
            "[monitor]\ninterval_ms = 750\n",
        )
        .unwrap();

        let loader = ConfigLoader::with_paths(
            dir.path().join("system.toml"),
            dir.path().join("user.toml"),
        );

        let mut cli = list_cli();
        cli.config = Some(dir.path().join("extra.toml"));

        let config = loader.load(&cli).unwrap();
        assert_eq!(config.monitor.interval_ms, 750);
    }

    #[test]
    fn test_missing_cli_config_is_an_error() {
        let dir = tempdir().unwrap();
        let loader = ConfigLoader::with_paths(
            dir.path().join("system.toml"),
            dir.path().join("user.toml"),
        );

        let mut cli = list_cli();
        cli.config = Some(dir.path().join("does_not_exist.toml"));

        let err = loader.load(&cli).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("system.toml"), "this is not valid TOML [[[").unwrap();

        let loader = ConfigLoader::with_paths(
            dir.path().join("system.toml"),
            dir.path().join("user.toml"),
        );

        let err = loader.load(&list_cli()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_cli_interval_flag_wins() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("user.toml"),
            "[monitor]\ninterval_ms = 1500\n",
        )
        .unwrap();

        let loader = ConfigLoader::with_paths(
            dir.path().join("system.toml"),
            dir.path().join("user.toml"),
        );

        let config = loader.load(&watch_cli(Some(250))).unwrap();
        assert_eq!(config.monitor.interval_ms, 250);
    }

    #[test]
    fn test_zero_interval_from_any_source_rejected() {
        let dir = tempdir().unwrap();
        let loader = ConfigLoader::with_paths(
            dir.path().join("system.toml"),
            dir.path().join("user.toml"),
        );

        let err = loader.load(&watch_cli(Some(0))).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
