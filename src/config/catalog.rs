//! Resolved, immutable view of a validated configuration

use super::loader::{resolve_directory, validate_ids, ConfigError, Result};
use super::types::{Config, DriverKind, ReportConfig};
use crate::utils::storage::{LocalDirectory, StorageNode};
use std::path::PathBuf;

/// A named origin of data, paired with one driver
#[derive(Debug, Clone)]
pub struct Source {
    pub id: String,
    pub driver: DriverKind,
    pub options: toml::Table,
    pub minimum_keeping_backups: Option<u32>,
    pub cleanup_on_backup: Option<bool>,
}

impl Source {
    pub fn new(id: impl Into<String>, driver: DriverKind, options: toml::Table) -> Self {
        Self {
            id: id.into(),
            driver,
            options,
            minimum_keeping_backups: None,
            cleanup_on_backup: None,
        }
    }

    /// Per-source floor, falling back to the global one
    pub fn effective_minimum_keeping(&self, global: &GlobalOptions) -> u32 {
        self.minimum_keeping_backups
            .unwrap_or(global.minimum_keeping_backups)
    }

    pub fn effective_cleanup_on_backup(&self, global: &GlobalOptions) -> bool {
        self.cleanup_on_backup.unwrap_or(global.cleanup_on_backup)
    }
}

/// A named storage target with an optional retention lifetime
#[derive(Debug)]
pub struct Destination {
    pub id: String,
    pub directory: Box<dyn StorageNode>,
    /// Days; `None` keeps backups forever
    pub lifetime: Option<u32>,
    pub options: toml::Table,
}

impl Destination {
    pub fn new(id: impl Into<String>, directory: Box<dyn StorageNode>, lifetime: Option<u32>) -> Self {
        Self {
            id: id.into(),
            directory,
            lifetime,
            options: toml::Table::new(),
        }
    }
}

/// Global defaults, fixed once at load time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalOptions {
    pub cleanup_on_backup: bool,
    pub minimum_keeping_backups: u32,
    pub transfer_retries: u32,
    pub temp_directory: PathBuf,
    pub lock_directory: PathBuf,
}

impl Default for GlobalOptions {
    fn default() -> Self {
        Self {
            cleanup_on_backup: false,
            minimum_keeping_backups: 0,
            transfer_retries: 0,
            temp_directory: std::env::temp_dir(),
            lock_directory: std::env::temp_dir(),
        }
    }
}

/// Sources, destinations and defaults for one run
#[derive(Debug)]
pub struct Catalog {
    sources: Vec<Source>,
    destinations: Vec<Destination>,
    options: GlobalOptions,
    report: Option<ReportConfig>,
}

impl Catalog {
    /// Build a catalog, enforcing id presence and uniqueness
    pub fn new(
        sources: Vec<Source>,
        destinations: Vec<Destination>,
        options: GlobalOptions,
    ) -> Result<Self> {
        validate_ids("source", sources.iter().map(|s| s.id.as_str()))?;
        validate_ids("destination", destinations.iter().map(|d| d.id.as_str()))?;

        Ok(Self {
            sources,
            destinations,
            options,
            report: None,
        })
    }

    /// Resolve a validated configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let sources = config
            .sources
            .iter()
            .map(|s| Source {
                id: s.id.clone(),
                driver: s.driver,
                options: s.options.clone(),
                minimum_keeping_backups: s.minimum_keeping_backups,
                cleanup_on_backup: s.cleanup_on_backup,
            })
            .collect();

        let destinations = config
            .destinations
            .iter()
            .map(|d| {
                let root = resolve_directory(d)?;
                Ok(Destination {
                    id: d.id.clone(),
                    directory: Box::new(LocalDirectory::new(root)) as Box<dyn StorageNode>,
                    lifetime: d.lifetime,
                    options: d.options.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let global = &config.options;
        let options = GlobalOptions {
            cleanup_on_backup: global.cleanup_on_backup,
            minimum_keeping_backups: global.minimum_keeping_source_backups,
            transfer_retries: global.transfer_source_backup_retries,
            temp_directory: global
                .temp_directory
                .as_deref()
                .map(super::expand_tilde)
                .unwrap_or_else(std::env::temp_dir),
            lock_directory: global
                .lock_directory
                .as_deref()
                .map(super::expand_tilde)
                .unwrap_or_else(std::env::temp_dir),
        };

        Ok(Self::new(sources, destinations, options)?.with_report(config.report.clone()))
    }

    pub fn with_report(mut self, report: Option<ReportConfig>) -> Self {
        self.report = report;
        self
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn destinations(&self) -> &[Destination] {
        &self.destinations
    }

    pub fn options(&self) -> &GlobalOptions {
        &self.options
    }

    pub fn report(&self) -> Option<&ReportConfig> {
        self.report.as_ref()
    }

    /// Sources named in `filter`, in configuration order; empty selects all
    pub fn select_sources(&self, filter: &[String]) -> Result<Vec<&Source>> {
        if let Some(unknown) = filter
            .iter()
            .find(|id| !self.sources.iter().any(|s| &s.id == *id))
        {
            return Err(ConfigError::SourceNotFound(unknown.clone()));
        }

        Ok(self
            .sources
            .iter()
            .filter(|s| filter.is_empty() || filter.contains(&s.id))
            .collect())
    }

    /// Destinations named in `filter`, in configuration order; empty selects all
    pub fn select_destinations(&self, filter: &[String]) -> Result<Vec<&Destination>> {
        if let Some(unknown) = filter
            .iter()
            .find(|id| !self.destinations.iter().any(|d| &d.id == *id))
        {
            return Err(ConfigError::DestinationNotFound(unknown.clone()));
        }

        Ok(self
            .destinations
            .iter()
            .filter(|d| filter.is_empty() || filter.contains(&d.id))
            .collect())
    }
}
