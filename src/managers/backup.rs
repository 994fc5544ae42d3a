//! Backup manager - orchestrates backup, restore and cleanup runs
//!
//! Sources are processed one after another in configuration order and a
//! failing source never stops the others. Every top-level call ends with at
//! most one report.

use crate::config::{Catalog, Destination, Source};
use crate::managers::logging::LogBuffer;
use crate::managers::naming::BackupName;
use crate::managers::report::ReportManager;
use crate::managers::retention::select_expired;
use crate::managers::selection::{BackupSelector, Candidate, RejectAmbiguous};
use crate::managers::transfer::transfer;
use crate::strategies::{for_driver, Artifact, DirectoryArtifact, DriverContext, FileArtifact};
use crate::utils::archive::{create_archive, extract_archive};
use crate::utils::executor::{CommandExecutor, RealExecutor};
use crate::utils::locker::SourceLock;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, error, info, warn};

/// Per-source outcome counts of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    fn record(&mut self, outcome: &Result<Outcome>) {
        match outcome {
            Ok(Outcome::Done) => self.succeeded += 1,
            Ok(Outcome::Skipped) => self.skipped += 1,
            Err(_) => self.failed += 1,
        }
    }
}

enum Outcome {
    Done,
    Skipped,
}

/// Which backup a restore should use
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreTarget {
    /// Exact file name, e.g. `web-1700000000-directory.zip`
    Named(String),
    /// Newest backup across the selected destinations
    Latest,
    /// Let the configured [`BackupSelector`] decide when ambiguous
    Ask,
}

/// One backup file as seen by `list`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupListing {
    pub source_id: String,
    pub destination_id: String,
    pub file_name: String,
    pub timestamp: i64,
    pub captured_at: String,
    pub directory: bool,
    pub size: Option<u64>,
}

/// A zip ready to be transferred, removed with its scratch directory
struct TransportUnit {
    name: BackupName,
    path: PathBuf,
    _scratch: TempDir,
}

pub struct BackupManager {
    catalog: Catalog,
    executor: Arc<dyn CommandExecutor>,
    selector: Box<dyn BackupSelector>,
    report_manager: Option<ReportManager>,
    log_buffer: Option<LogBuffer>,
}

impl BackupManager {
    /// Create new backup manager with real tools and no prompting
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            executor: Arc::new(RealExecutor::new()),
            selector: Box::new(RejectAmbiguous),
            report_manager: None,
            log_buffer: None,
        }
    }

    pub fn with_executor(mut self, executor: Arc<dyn CommandExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_selector(mut self, selector: Box<dyn BackupSelector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_report_manager(mut self, report_manager: ReportManager) -> Self {
        self.report_manager = Some(report_manager);
        self
    }

    /// Buffer whose contents become the report body
    pub fn with_log_buffer(mut self, buffer: LogBuffer) -> Self {
        self.log_buffer = Some(buffer);
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn context(&self) -> DriverContext<'_> {
        DriverContext::new(self.executor.as_ref(), &self.catalog.options().temp_directory)
    }

    fn scratch(&self, prefix: &str) -> Result<TempDir> {
        let root = &self.catalog.options().temp_directory;
        fs::create_dir_all(root)
            .with_context(|| format!("Failed to create temp directory: {:?}", root))?;
        tempfile::Builder::new()
            .prefix(prefix)
            .tempdir_in(root)
            .with_context(|| format!("Failed to create scratch directory in {:?}", root))
    }

    fn begin_report(&self, send_report: bool) {
        if send_report {
            if let Some(ref buffer) = self.log_buffer {
                buffer.clear();
            }
        }
    }

    fn finish_report(&self, kind: &str, send_report: bool) {
        if !send_report {
            return;
        }

        let Some(ref manager) = self.report_manager else {
            warn!("A report was requested but no [report] section is configured");
            return;
        };

        let body = self
            .log_buffer
            .as_ref()
            .map(LogBuffer::take)
            .unwrap_or_default();

        if let Err(e) = manager.send(kind, &body) {
            error!("Failed to send {} report: {:#}", kind, e);
        }
    }

    fn log_summary(kind: &str, summary: &RunSummary) {
        info!(
            "{} finished: {} succeeded, {} failed, {} skipped",
            kind, summary.succeeded, summary.failed, summary.skipped
        );
    }

    // ----- backup -----

    /// Back up the selected sources to the selected destinations
    ///
    /// Empty filters select everything; an unknown id fails before any work.
    pub fn backup(&self, sources: &[String], destinations: &[String], send_report: bool) -> Result<RunSummary> {
        let sources = self.catalog.select_sources(sources)?;
        let destinations = self.catalog.select_destinations(destinations)?;

        self.begin_report(send_report);

        let mut summary = RunSummary::default();
        for source in sources {
            let outcome = self.backup_source(source, &destinations);
            if let Err(ref e) = outcome {
                error!("Backup of source '{}' failed: {:#}", source.id, e);
            }
            summary.record(&outcome);
        }

        Self::log_summary("Backup", &summary);
        self.finish_report("backup", send_report);
        Ok(summary)
    }

    fn backup_source(&self, source: &Source, destinations: &[&Destination]) -> Result<Outcome> {
        let options = self.catalog.options();
        let mut lock = SourceLock::open(&options.lock_directory, &source.id)?;
        let _guard = lock.try_acquire()?;

        info!("Starting backup for source: {} ({})", source.id, source.driver);

        let strategy = for_driver(source.driver);
        let artifact = strategy
            .backup(&source.options, &self.context())
            .with_context(|| format!("{} backup failed", strategy.name()))?;

        let unit = self.package(&source.id, &artifact)?;
        drop(artifact);

        let mut failures = Vec::new();
        for destination in destinations {
            info!("Transferring {} to destination: {}", unit.name.file_name(), destination.id);

            match transfer(
                &destination.id,
                destination.directory.as_ref(),
                &unit.path,
                &unit.name.file_name(),
                options.transfer_retries,
            ) {
                Ok(_) => {
                    if source.effective_cleanup_on_backup(options) {
                        let all: Vec<&Destination> = self.catalog.destinations().iter().collect();
                        if let Err(e) = self.cleanup_source(source, &all) {
                            warn!("Cleanup after backup of '{}' failed: {:#}", source.id, e);
                        }
                    }
                }
                Err(e) => {
                    error!("{}", e);
                    failures.push(destination.id.clone());
                }
            }
        }

        if !failures.is_empty() {
            anyhow::bail!(
                "Transfer failed for {} destination(s): {}",
                failures.len(),
                failures.join(", ")
            );
        }

        info!("Backup for source '{}' completed", source.id);
        Ok(Outcome::Done)
    }

    /// Turn an artifact into a single transportable zip
    fn package(&self, source_id: &str, artifact: &Artifact) -> Result<TransportUnit> {
        let scratch = self.scratch("backuping-unit-")?;
        let timestamp = chrono::Utc::now().timestamp();

        let name = match artifact {
            Artifact::Directory(dir) => {
                let name = BackupName::new(source_id, timestamp, true);
                let path = scratch.path().join(name.file_name());
                let entries = dir.entries()?;
                let files = create_archive(&entries, &path)
                    .with_context(|| format!("Failed to package {:?}", dir.root()))?;
                debug!("Packaged {} files for source '{}'", files, source_id);
                name
            }
            Artifact::File(file) => {
                let name = BackupName::new(source_id, timestamp, false);
                fs::copy(file.path(), scratch.path().join(name.file_name()))
                    .with_context(|| format!("Failed to stage {:?}", file.path()))?;
                name
            }
        };

        Ok(TransportUnit {
            path: scratch.path().join(name.file_name()),
            name,
            _scratch: scratch,
        })
    }

    // ----- restore -----

    /// Restore the selected sources from the selected destinations
    pub fn restore(
        &self,
        sources: &[String],
        target: &RestoreTarget,
        destinations: &[String],
        send_report: bool,
    ) -> Result<RunSummary> {
        let sources = self.catalog.select_sources(sources)?;
        let destinations = self.catalog.select_destinations(destinations)?;

        self.begin_report(send_report);

        let mut summary = RunSummary::default();
        for source in sources {
            let outcome = self.restore_source(source, target, &destinations);
            if let Err(ref e) = outcome {
                error!("Restore of source '{}' failed: {:#}", source.id, e);
            }
            summary.record(&outcome);
        }

        Self::log_summary("Restore", &summary);
        self.finish_report("restore", send_report);
        Ok(summary)
    }

    /// Backups of `source` across `destinations`, in destination order
    pub fn find_candidates(&self, source: &Source, destinations: &[&Destination]) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        for destination in destinations {
            let files = match destination.directory.list_files(false) {
                Ok(files) => files,
                Err(e) => {
                    warn!("Failed to list destination '{}': {}", destination.id, e);
                    continue;
                }
            };

            candidates.extend(files.into_iter().filter_map(|file_name| {
                BackupName::parse(&source.id, &file_name).map(|name| Candidate {
                    name,
                    destination_id: destination.id.clone(),
                    file_name,
                })
            }));
        }

        candidates
    }

    fn choose(&self, source_id: &str, target: &RestoreTarget, mut candidates: Vec<Candidate>) -> Result<Option<Candidate>> {
        if let RestoreTarget::Named(ref wanted) = target {
            candidates.retain(|c| &c.file_name == wanted);
            // The same file on several destinations is one backup
            if let Some(first) = candidates.first() {
                return Ok(Some(first.clone()));
            }
            anyhow::bail!("Backup '{}' not found for source '{}'", wanted, source_id);
        }

        if candidates.is_empty() {
            anyhow::bail!("No backups found for source '{}'", source_id);
        }

        if candidates.len() == 1 {
            return Ok(candidates.pop());
        }

        if *target == RestoreTarget::Latest {
            let mut latest = &candidates[0];
            for candidate in &candidates[1..] {
                if candidate.name.timestamp > latest.name.timestamp {
                    latest = candidate;
                }
            }
            return Ok(Some(latest.clone()));
        }

        // Newest first; the stable sort keeps destination order for ties
        candidates.sort_by(|a, b| b.name.timestamp.cmp(&a.name.timestamp));
        Ok(self
            .selector
            .select(source_id, &candidates)
            .and_then(|index| candidates.get(index).cloned()))
    }

    fn restore_source(&self, source: &Source, target: &RestoreTarget, destinations: &[&Destination]) -> Result<Outcome> {
        let candidates = self.find_candidates(source, destinations);
        let Some(chosen) = self.choose(&source.id, target, candidates)? else {
            info!("Skipping restore of source '{}'", source.id);
            return Ok(Outcome::Skipped);
        };

        let destination = destinations
            .iter()
            .find(|d| d.id == chosen.destination_id)
            .with_context(|| format!("Destination not found: {}", chosen.destination_id))?;

        let mut lock = SourceLock::open(&self.catalog.options().lock_directory, &source.id)?;
        let _guard = lock.try_acquire()?;

        info!(
            "Restoring source '{}' from {} on '{}'",
            source.id, chosen.file_name, destination.id
        );

        let download = self.scratch("backuping-restore-")?;
        let local = download.path().join(&chosen.file_name);
        destination
            .directory
            .download(&chosen.file_name, &local)
            .with_context(|| format!("Failed to fetch {} from '{}'", chosen.file_name, destination.id))?;

        let artifact = if chosen.name.directory {
            let extracted = self.scratch("backuping-extract-")?;
            let files = extract_archive(&local, extracted.path())
                .with_context(|| format!("Failed to extract {}", chosen.file_name))?;
            debug!("Extracted {} files", files);
            Artifact::Directory(DirectoryArtifact::scratch(extracted))
        } else {
            Artifact::File(FileArtifact::borrowed(local))
        };

        let strategy = for_driver(source.driver);
        strategy
            .restore(&artifact, &source.options, &self.context())
            .with_context(|| format!("{} restore failed", strategy.name()))?;

        info!("Restore for source '{}' completed", source.id);
        Ok(Outcome::Done)
    }

    // ----- cleanup -----

    /// Delete expired backups of the selected sources
    pub fn cleanup(&self, sources: &[String], destinations: &[String], send_report: bool) -> Result<RunSummary> {
        let sources = self.catalog.select_sources(sources)?;
        let destinations = self.catalog.select_destinations(destinations)?;

        self.begin_report(send_report);

        let mut summary = RunSummary::default();
        for source in sources {
            let outcome = self.cleanup_source(source, &destinations).map(|_| Outcome::Done);
            if let Err(ref e) = outcome {
                error!("Cleanup of source '{}' failed: {:#}", source.id, e);
            }
            summary.record(&outcome);
        }

        Self::log_summary("Cleanup", &summary);
        self.finish_report("cleanup", send_report);
        Ok(summary)
    }

    /// Returns the number of deleted backups
    fn cleanup_source(&self, source: &Source, destinations: &[&Destination]) -> Result<usize> {
        let minimum_keeping = source.effective_minimum_keeping(self.catalog.options());
        let now = chrono::Utc::now().timestamp();

        let mut deleted = 0;
        let mut failures = 0;

        for destination in destinations {
            let Some(lifetime) = destination.lifetime else {
                debug!("Destination '{}' keeps backups forever", destination.id);
                continue;
            };

            let files = match destination.directory.list_files(false) {
                Ok(files) => files,
                Err(e) => {
                    error!("Failed to list destination '{}': {}", destination.id, e);
                    failures += 1;
                    continue;
                }
            };

            let backups: Vec<BackupName> = files
                .iter()
                .filter_map(|f| BackupName::parse(&source.id, f))
                .collect();

            for expired in select_expired(&backups, lifetime, minimum_keeping, now) {
                let file_name = expired.file_name();
                match destination.directory.delete(&file_name) {
                    Ok(()) => {
                        info!("Deleted {} from '{}'", file_name, destination.id);
                        deleted += 1;
                    }
                    Err(e) => {
                        error!("Failed to delete {} from '{}': {}", file_name, destination.id, e);
                        failures += 1;
                    }
                }
            }
        }

        if failures > 0 {
            anyhow::bail!("{} cleanup step(s) failed for source '{}'", failures, source.id);
        }

        Ok(deleted)
    }

    // ----- list -----

    /// Every backup of the selected sources, grouped by source then destination
    pub fn list(&self, sources: &[String], destinations: &[String]) -> Result<Vec<BackupListing>> {
        let sources = self.catalog.select_sources(sources)?;
        let destinations = self.catalog.select_destinations(destinations)?;

        let mut listings = Vec::new();
        for source in sources {
            for candidate in self.find_candidates(source, &destinations) {
                let size = destinations
                    .iter()
                    .find(|d| d.id == candidate.destination_id)
                    .and_then(|d| d.directory.size(&candidate.file_name).ok());

                listings.push(BackupListing {
                    source_id: source.id.clone(),
                    destination_id: candidate.destination_id,
                    captured_at: candidate.name.captured_at(),
                    timestamp: candidate.name.timestamp,
                    directory: candidate.name.directory,
                    file_name: candidate.file_name,
                    size,
                });
            }
        }

        Ok(listings)
    }
}
