//! Run orchestration and its collaborators

pub mod backup;
pub mod logging;
pub mod naming;
pub mod report;
pub mod retention;
pub mod selection;
pub mod transfer;
