//! Configuration loading with hierarchy merging.
//!
//! Sources are merged in order, later sources overriding set values:
//!
//! 1. Built-in defaults
//! 2. System config: `/etc/cachewall/config.toml`
//! 3. User config: `~/.config/cachewall/config.toml`
//! 4. Additional config file (via `--config` flag)
//! 5. CLI flags (highest priority)
//!
//! Missing system/user config files are not errors; they are skipped.
//! A missing `--config` file *is* an error (the user asked for it).
//! Invalid TOML is always an error (fail fast with a clear message).

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::ConfigError;
use super::schema::Config;
use crate::cli::Cli;

/// System-wide configuration path.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/cachewall/config.toml";

/// User configuration directory name.
pub const USER_CONFIG_DIR: &str = "cachewall";

/// User configuration filename.
pub const USER_CONFIG_FILE: &str = "config.toml";

/// Configuration loader with support for hierarchy merging.
pub struct ConfigLoader {
    /// Path to system-wide configuration.
    system_path: PathBuf,
    /// Path to user configuration.
    user_path: PathBuf,
}

impl ConfigLoader {
    /// Create a new loader with the default paths.
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

    /// Load and merge configuration from all sources.
    pub fn load(&self, cli: &Cli) -> Result<Config, ConfigError> {
        let mut config = Config::default();

        if let Some(system) = self.load_file(&self.system_path)? {
            config.merge(system);
            debug!("Loaded system config from {:?}", self.system_path);
        } else {
            debug!("No system config found at {:?}", self.system_path);
        }

        if let Some(user) = self.load_file(&self.user_path)? {
            config.merge(user);
            debug!("Loaded user config from {:?}", self.user_path);
        } else {
            debug!("No user config found at {:?}", self.user_path);
        }

        if let Some(path) = &cli.config {
            match self.load_file(path)? {
                Some(extra) => {
                    config.merge(extra);
                    debug!("Loaded additional config from {:?}", path);
                }
                None => {
                    return Err(ConfigError::ReadError {
                        path: path.clone(),
                        source: std::io::Error::new(
                            std::io::ErrorKind::NotFound,
                            "config file not found",
                        ),
                    });
                }
            }
        }

        // CLI flags win over every file
        if let Some(listen) = &cli.listen {
            config.server.listen = listen.clone();
        }
        if let Some(ttl) = cli.cache_ttl {
            config.cache.ttl_secs = ttl;
        }
        if let Some(path) = &cli.blocklist {
            config.blocklist.path = path.display().to_string();
        }
        if let Some(dir) = &cli.log_dir {
            config.log.dir = dir.display().to_string();
        }

        Ok(config)
    }

    /// Load a single config file, returning None if it does not exist.
    fn load_file(&self, path: &Path) -> Result<Option<Config>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;

        let config = toml::from_str(&contents).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Some(config))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
