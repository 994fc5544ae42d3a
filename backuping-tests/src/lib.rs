//! Test utilities for backuping
//!
//! This crate provides shared test utilities, test doubles,
//! and helper functions for testing the backuping application.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use test_utils::{ConfigBuilder, TestContext, MockExecutor};
//!
//! #[test]
//! fn my_test() {
//!     let ctx = TestContext::from_builder(
//!         ConfigBuilder::minimal().add_directory_source("files", "/srv/files", &[]),
//!     );
//!     let manager = ctx.manager(MockExecutor::new());
//!     // ... test code
//! }
//! ```

pub mod config_builder;
pub mod doubles;
pub mod fixtures;
pub mod test_context;

// Re-export commonly used items
pub use config_builder::ConfigBuilder;
pub use doubles::{FlakyNode, RecordingMailer};
pub use fixtures::*;
pub use test_context::{ResultAssertions, TestContext};

// Re-export types from the main crate for convenience
pub use backuping::config::{
    Catalog, Config, Destination, DestinationConfig, DriverKind, GlobalConfig, GlobalOptions,
    ReportConfig, Source, SourceConfig,
};
pub use backuping::managers::backup::{BackupManager, RestoreTarget, RunSummary};
pub use backuping::managers::naming::BackupName;

// Re-export mock implementations from the main crate
pub use backuping::utils::executor::mock::{CommandCall, MockExecutor, MockResponse};
pub use backuping::utils::executor::CommandExecutor;
pub use backuping::utils::storage::{LocalDirectory, StorageNode};

/// Common test result type
pub type TestResult<T = ()> = anyhow::Result<T>;
