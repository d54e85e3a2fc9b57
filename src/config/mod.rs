//! Hierarchical TOML configuration.
//!
//! The engine consumes a single `[monitor]` table: the polling interval and
//! the address family of the TCP table to scan. Loading and merging follow
//! the usual system → user → explicit-file → CLI-flag order.

pub mod error;
pub mod loader;
pub mod schema;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{Config, MonitorConfig, DEFAULT_INTERVAL_MS};
