//! Backuping Library
//!
//! Declarative multi-source, multi-destination backups: filesystem trees and
//! MySQL, MongoDB or PostgreSQL databases, packaged into zip files and
//! copied to storage destinations with retention.

pub mod config;
pub mod managers;
pub mod strategies;
pub mod utils;

// Re-export commonly used types
pub use config::{load_config, Catalog, Config, ConfigError, Destination, GlobalOptions, Source};
pub use managers::backup::{BackupListing, BackupManager, RestoreTarget, RunSummary};
pub use managers::logging::{init_console_logging, init_logging, LogBuffer, LogGuard, LoggingConfig};
pub use managers::report::{Mailer, Report, ReportManager};
pub use managers::selection::{BackupSelector, Candidate, InteractiveSelector, RejectAmbiguous};
