pub mod archive;
pub mod command;
pub mod locker;
pub mod storage;

// Trait-based abstractions for testability
pub mod executor;

// Re-export commonly used types and traits (used by test crate)
pub use command::{ToolError, ToolInvocation};
pub use executor::{CommandExecutor, RealExecutor};
pub use storage::{LocalDirectory, StorageNode};
