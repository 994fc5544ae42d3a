//! Configuration module for backuping
//!
//! This module handles loading and validating configuration from TOML files,
//! and resolving it into an immutable [`Catalog`] of sources and destinations.
//!
//! ## Effective values
//!
//! `minimum_keeping_backups` and `cleanup_on_backup` may be set per source;
//! when unset the values from the global `[options]` table apply.
//!
//! ## Example Usage
//!
//! ```no_run
//! use backuping::config;
//!
//! let config = config::load_config("/etc/backuping/config.toml")?;
//! let catalog = config::Catalog::from_config(&config)?;
//!
//! for source in catalog.sources() {
//!     println!("Source: {}, driver: {}", source.id, source.driver);
//! }
//! # Ok::<(), config::ConfigError>(())
//! ```

mod catalog;
mod loader;
mod types;

pub use catalog::{Catalog, Destination, GlobalOptions, Source};
pub use loader::{load_config, parse_config, resolve_directory, ConfigError, Result};
pub use types::*;

/// Expand tilde (~) in path
pub fn expand_tilde(path: &std::path::Path) -> std::path::PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}
