//! Fluent API for building test configurations
//!
//! Provides a builder pattern for creating test configurations with sensible defaults.
//! Every path the configuration touches lives inside the builder's temp directory.

use backuping::config::{
    Config, DestinationConfig, DriverKind, FromAddress, GlobalConfig, MailerKind, MailerOptions,
    ReceiverConfig, ReportConfig, SenderConfig, SourceConfig,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Builder for creating test configurations
pub struct ConfigBuilder {
    temp_dir: TempDir,
    options: GlobalConfig,
    sources: Vec<SourceConfig>,
    destinations: Vec<DestinationConfig>,
    report: Option<ReportConfig>,
}

impl ConfigBuilder {
    /// Create a new ConfigBuilder with no sources or destinations
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let log_directory = temp_dir.path().join("logs");
        fs::create_dir_all(&log_directory).expect("Failed to create log_directory");

        let options = GlobalConfig {
            log_directory,
            log_max_files: 5,
            temp_directory: Some(temp_dir.path().join("tmp")),
            lock_directory: Some(temp_dir.path().join("locks")),
            ..Default::default()
        };

        Self {
            temp_dir,
            options,
            sources: Vec::new(),
            destinations: Vec::new(),
            report: None,
        }
    }

    /// Create a config with a single `local` destination
    pub fn minimal() -> Self {
        let builder = Self::new();
        let backup_path = builder.temp_dir.path().join("backups");
        builder.add_local_destination("local", &backup_path, None)
    }

    /// Add a destination backed by a local directory
    pub fn add_local_destination(mut self, id: &str, path: &Path, lifetime: Option<u32>) -> Self {
        self.destinations.push(DestinationConfig {
            id: id.to_string(),
            directory: path.display().to_string(),
            lifetime,
            options: toml::Table::new(),
        });
        self
    }

    /// Add a destination with custom settings
    pub fn add_destination(mut self, destination: DestinationConfig) -> Self {
        self.destinations.push(destination);
        self
    }

    /// Add a directory source
    pub fn add_directory_source(self, id: &str, path: impl AsRef<Path>, excludes: &[&str]) -> Self {
        let mut options = toml::Table::new();
        options.insert(
            "directory".to_string(),
            toml::Value::String(path.as_ref().display().to_string()),
        );
        if !excludes.is_empty() {
            options.insert(
                "exclude".to_string(),
                toml::Value::Array(
                    excludes
                        .iter()
                        .map(|e| toml::Value::String(e.to_string()))
                        .collect(),
                ),
            );
        }
        self.add_source(id, DriverKind::Directory, options)
    }

    /// Add a source with any driver; `options` is driver specific
    pub fn add_source(mut self, id: &str, driver: DriverKind, options: toml::Table) -> Self {
        self.sources.push(SourceConfig {
            id: id.to_string(),
            driver,
            minimum_keeping_backups: None,
            cleanup_on_backup: None,
            options,
        });
        self
    }

    /// Add a source with full configuration
    pub fn add_source_config(mut self, source: SourceConfig) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_cleanup_on_backup(mut self, enabled: bool) -> Self {
        self.options.cleanup_on_backup = enabled;
        self
    }

    pub fn with_minimum_keeping(mut self, count: u32) -> Self {
        self.options.minimum_keeping_source_backups = count;
        self
    }

    pub fn with_transfer_retries(mut self, retries: u32) -> Self {
        self.options.transfer_source_backup_retries = retries;
        self
    }

    /// Send reports through the local `sendmail`
    pub fn with_mail_report(mut self, receivers: &[&str]) -> Self {
        self.report = Some(ReportConfig {
            subject: "test report".to_string(),
            sender: SenderConfig {
                mailer: MailerKind::Mail,
                options: MailerOptions::default(),
                from: Some(FromAddress {
                    address: "backup@example.com".to_string(),
                    name: "Backuping".to_string(),
                }),
            },
            receivers: receivers
                .iter()
                .map(|mail| ReceiverConfig {
                    name: String::new(),
                    mail: mail.to_string(),
                })
                .collect(),
        });
        self
    }

    /// Set the report configuration
    pub fn with_report(mut self, report: ReportConfig) -> Self {
        self.report = Some(report);
        self
    }

    /// Get the temp directory path
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Get a destination backup path
    pub fn destination_path(&self, id: &str) -> Option<PathBuf> {
        self.destinations
            .iter()
            .find(|d| d.id == id)
            .map(|d| PathBuf::from(&d.directory))
    }

    fn config(&self) -> Config {
        Config {
            options: self.options.clone(),
            sources: self.sources.clone(),
            destinations: self.destinations.clone(),
            report: self.report.clone(),
        }
    }

    /// Build the Config
    pub fn build(self) -> Config {
        self.config()
    }

    /// Serialize the configuration into `config.toml` inside the temp dir
    pub fn write_toml(&self) -> PathBuf {
        let path = self.temp_dir.path().join("config.toml");
        let contents = toml::to_string(&self.config()).expect("Failed to serialize config");
        fs::write(&path, contents).expect("Failed to write config file");
        path
    }

    /// Keep the temp directory (don't delete on drop)
    pub fn persist(self) -> (Config, TempDir) {
        let config = self.config();
        (config, self.temp_dir)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
