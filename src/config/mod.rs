//! Hierarchical TOML configuration.
//!
//! See [`loader`] for the merge order and [`schema`] for the sections.

mod error;
mod loader;
mod schema;

pub use error::ConfigError;
pub use loader::{ConfigLoader, SYSTEM_CONFIG_PATH, USER_CONFIG_DIR, USER_CONFIG_FILE};
pub use schema::{
    BlocklistConfig, CacheConfig, Config, LogConfig, ServerConfig, DEFAULT_BLOCKLIST_PATH,
    DEFAULT_LISTEN, DEFAULT_LOG_DIR, DEFAULT_TTL_SECS,
};
