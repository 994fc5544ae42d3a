//! Retrying copy of a transport unit into a destination

use crate::utils::storage::StorageNode;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("Transfer to '{destination}' failed after {attempts} attempts: {last_error}")]
    Exhausted {
        destination: String,
        attempts: u32,
        last_error: String,
    },
}

fn attempt(node: &dyn StorageNode, local: &Path, name: &str) -> Result<(), String> {
    if !node.exists() {
        debug!("Creating destination directory {}", node.location());
        node.create_dir_all().map_err(|e| e.to_string())?;
    }

    match node.upload(local, name) {
        Ok(true) => Ok(()),
        Ok(false) => Err(format!("{} refused {}", node.location(), name)),
        Err(e) => Err(e.to_string()),
    }
}

/// Copy `local` into `node` as `name`, trying up to `retries + 1` times
///
/// Returns the number of attempts used.
pub fn transfer(
    destination: &str,
    node: &dyn StorageNode,
    local: &Path,
    name: &str,
    retries: u32,
) -> Result<u32, TransferError> {
    let attempts = retries.saturating_add(1);
    let mut last_error = String::new();

    for current in 1..=attempts {
        match attempt(node, local, name) {
            Ok(()) => {
                info!("Transferred {} to '{}' (attempt {})", name, destination, current);
                return Ok(current);
            }
            Err(e) => {
                warn!(
                    "Transfer of {} to '{}' failed (attempt {}/{}): {}",
                    name, destination, current, attempts, e
                );
                last_error = e;
            }
        }
    }

    Err(TransferError::Exhausted {
        destination: destination.to_string(),
        attempts,
        last_error,
    })
}
