//! Test doubles for the crate's seams: storage nodes and mailers

use backuping::managers::report::{Mailer, Report};
use backuping::utils::storage::{LocalDirectory, StorageNode};
use parking_lot::Mutex;
use std::io;
use std::path::Path;
use std::sync::Arc;

/// Mailer that keeps every report it is asked to send
#[derive(Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<Report>>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Report> {
        self.sent.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().len()
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, report: &Report) -> anyhow::Result<()> {
        self.sent.lock().push(report.clone());
        Ok(())
    }
}

/// Local directory whose first `failures` uploads fail
#[derive(Debug, Clone)]
pub struct FlakyNode {
    inner: LocalDirectory,
    failures: u32,
    refuse: bool,
    attempts: Arc<Mutex<u32>>,
}

impl FlakyNode {
    /// Uploads fail with an I/O error
    pub fn new(root: impl AsRef<Path>, failures: u32) -> Self {
        Self {
            inner: LocalDirectory::new(root.as_ref()),
            failures,
            refuse: false,
            attempts: Arc::new(Mutex::new(0)),
        }
    }

    /// Uploads report `Ok(false)` instead of an error
    pub fn refusing(mut self) -> Self {
        self.refuse = true;
        self
    }

    /// Shared attempt counter, readable after the node moved into a catalog
    pub fn attempts(&self) -> Arc<Mutex<u32>> {
        Arc::clone(&self.attempts)
    }
}

impl StorageNode for FlakyNode {
    fn location(&self) -> String {
        format!("flaky:{}", self.inner.location())
    }

    fn exists(&self) -> bool {
        self.inner.exists()
    }

    fn create_dir_all(&self) -> io::Result<()> {
        self.inner.create_dir_all()
    }

    fn write_file(&self, name: &str, contents: &[u8]) -> io::Result<()> {
        self.inner.write_file(name, contents)
    }

    fn read_file(&self, name: &str) -> io::Result<Vec<u8>> {
        self.inner.read_file(name)
    }

    fn list_files(&self, recursive: bool) -> io::Result<Vec<String>> {
        self.inner.list_files(recursive)
    }

    fn upload(&self, local: &Path, name: &str) -> io::Result<bool> {
        let attempt = {
            let mut attempts = self.attempts.lock();
            *attempts += 1;
            *attempts
        };

        if attempt <= self.failures {
            if self.refuse {
                return Ok(false);
            }
            return Err(io::Error::new(io::ErrorKind::Other, "simulated upload failure"));
        }

        self.inner.upload(local, name)
    }

    fn download(&self, name: &str, local: &Path) -> io::Result<()> {
        self.inner.download(name, local)
    }

    fn delete(&self, name: &str) -> io::Result<()> {
        self.inner.delete(name)
    }

    fn size(&self, name: &str) -> io::Result<u64> {
        self.inner.size(name)
    }
}
