//! Configuration schema definitions.
//!
//! Configuration is loaded from multiple sources and merged in order:
//!
//! 1. Built-in defaults
//! 2. System config: `/etc/cachewall/config.toml`
//! 3. User config: `~/.config/cachewall/config.toml`
//! 4. Additional config file (via `--config` flag)
//! 5. CLI flags (highest priority)
//!
//! Scalars use a sentinel default (empty string / zero) meaning "unset";
//! merging overrides a value only when the later source actually set it.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// Default listen address when none is configured.
pub const DEFAULT_LISTEN: &str = "127.0.0.1:8080";

/// Default blocklist file path, relative to the working directory.
pub const DEFAULT_BLOCKLIST_PATH: &str = "blocked_hosts";

/// Default directory for event log files.
pub const DEFAULT_LOG_DIR: &str = ".";

/// Default cache TTL in seconds.
pub const DEFAULT_TTL_SECS: u64 = 600;

/// Top-level configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Blocklist settings.
    #[serde(default)]
    pub blocklist: BlocklistConfig,

    /// Event log settings.
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    /// Merge another config into this one. Set values in `other` win.
    pub fn merge(&mut self, other: Config) {
        self.server.merge(other.server);
        self.cache.merge(other.cache);
        self.blocklist.merge(other.blocklist);
        self.log.merge(other.log);
    }
}

/// Server settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Address to listen on (`host:port`). Empty means the default.
    #[serde(default)]
    pub listen: String,
}

impl ServerConfig {
    fn merge(&mut self, other: ServerConfig) {
        if !other.listen.is_empty() {
            self.listen = other.listen;
        }
    }

    /// Resolve the configured listen address.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = if self.listen.is_empty() {
            DEFAULT_LISTEN
        } else {
            &self.listen
        };
        raw.parse().map_err(|_| ConfigError::InvalidValue {
            field: "server.listen".to_string(),
            message: format!("'{}' is not a valid socket address", raw),
        })
    }
}

/// Cache settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Entry lifetime in seconds. Zero means the default (600).
    #[serde(default)]
    pub ttl_secs: u64,
}

impl CacheConfig {
    fn merge(&mut self, other: CacheConfig) {
        if other.ttl_secs != 0 {
            self.ttl_secs = other.ttl_secs;
        }
    }

    /// Resolve the configured TTL.
    pub fn ttl(&self) -> Duration {
        if self.ttl_secs == 0 {
            Duration::from_secs(DEFAULT_TTL_SECS)
        } else {
            Duration::from_secs(self.ttl_secs)
        }
    }
}

/// Blocklist settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BlocklistConfig {
    /// Path to the newline-delimited blocked-hosts file. Empty means the
    /// default (`blocked_hosts` in the working directory).
    #[serde(default)]
    pub path: String,
}

impl BlocklistConfig {
    fn merge(&mut self, other: BlocklistConfig) {
        if !other.path.is_empty() {
            self.path = other.path;
        }
    }

    /// Resolve the configured blocklist path.
    pub fn path(&self) -> PathBuf {
        if self.path.is_empty() {
            PathBuf::from(DEFAULT_BLOCKLIST_PATH)
        } else {
            PathBuf::from(&self.path)
        }
    }
}

/// Event log settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LogConfig {
    /// Directory for the event log files. Empty means the working
    /// directory.
    #[serde(default)]
    pub dir: String,
}

impl LogConfig {
    fn merge(&mut self, other: LogConfig) {
        if !other.dir.is_empty() {
            self.dir = other.dir;
        }
    }

    /// Resolve the configured log directory.
    pub fn dir(&self) -> PathBuf {
        if self.dir.is_empty() {
            PathBuf::from(DEFAULT_LOG_DIR)
        } else {
            PathBuf::from(&self.dir)
        }
    }
}
