//! File-based locking to prevent overlapping runs on the same source

use anyhow::{Context, Result};
use fd_lock::{RwLock, RwLockWriteGuard};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Lock file for one source
pub struct SourceLock {
    lock: RwLock<File>,
    lock_path: PathBuf,
    source_id: String,
}

/// Held lock, released when dropped
///
/// The lock file stays in place so every run locks the same inode.
pub struct SourceLockGuard<'a> {
    _guard: RwLockWriteGuard<'a, File>,
    lock_path: &'a Path,
}

impl SourceLock {
    /// Open (or create) the lock file for a source inside `dir`
    pub fn open(dir: &Path, source_id: &str) -> Result<Self> {
        let lock_path = Self::lock_path(dir, source_id);

        debug!("Opening lock file: {:?}", lock_path);

        std::fs::create_dir_all(dir).context("Failed to create lock directory")?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file: {:?}", lock_path))?;

        Ok(Self {
            lock: RwLock::new(file),
            lock_path,
            source_id: source_id.to_string(),
        })
    }

    /// Take the exclusive lock without blocking
    ///
    /// Fails if another run already holds the lock for this source.
    pub fn try_acquire(&mut self) -> Result<SourceLockGuard<'_>> {
        let guard = self.lock.try_write().with_context(|| {
            format!(
                "Source '{}' is already being processed (lock held)",
                self.source_id
            )
        })?;

        info!("Acquired lock for source: {}", self.source_id);

        Ok(SourceLockGuard {
            _guard: guard,
            lock_path: &self.lock_path,
        })
    }

    /// Lock file path for a source
    pub fn lock_path(dir: &Path, source_id: &str) -> PathBuf {
        dir.join(format!("backuping-{}.lock", source_id))
    }

    /// Get the lock file path (for cleanup or inspection)
    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for SourceLockGuard<'_> {
    fn drop(&mut self) {
        debug!("Released lock: {:?}", self.lock_path);
    }
}
