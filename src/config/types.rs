use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub options: GlobalConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub destinations: Vec<DestinationConfig>,
    #[serde(default)]
    pub report: Option<ReportConfig>,
}

/// Global defaults, the `[options]` table
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GlobalConfig {
    /// Run cleanup for a source right after each successful transfer
    #[serde(default)]
    pub cleanup_on_backup: bool,

    /// Backups always kept per (source, destination), whatever their age
    #[serde(default)]
    pub minimum_keeping_source_backups: u32,

    /// Extra transfer attempts after the first one fails
    #[serde(default)]
    pub transfer_source_backup_retries: u32,

    /// Logging configuration
    #[serde(default = "default_log_directory")]
    pub log_directory: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_max_files")]
    pub log_max_files: u32,

    /// Root for dump scratch space and transport units (system temp dir if unset)
    #[serde(default)]
    pub temp_directory: Option<PathBuf>,

    /// Where per-source lock files live (system temp dir if unset)
    #[serde(default)]
    pub lock_directory: Option<PathBuf>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            cleanup_on_backup: false,
            minimum_keeping_source_backups: 0,
            transfer_source_backup_retries: 0,
            log_directory: default_log_directory(),
            log_level: default_log_level(),
            log_max_files: default_log_max_files(),
            temp_directory: None,
            lock_directory: None,
        }
    }
}

/// Closed set of backup drivers, selected by the `driver` key
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub enum DriverKind {
    #[serde(rename = "directory")]
    Directory,
    #[serde(rename = "mysql", alias = "mariadb")]
    MySql,
    #[serde(rename = "mongodb", alias = "mongo")]
    MongoDb,
    #[serde(rename = "postgresql", alias = "postgres")]
    PostgreSql,
}

impl DriverKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverKind::Directory => "directory",
            DriverKind::MySql => "mysql",
            DriverKind::MongoDb => "mongodb",
            DriverKind::PostgreSql => "postgresql",
        }
    }
}

impl std::fmt::Display for DriverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `[[sources]]` entry
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    pub id: String,

    pub driver: DriverKind,

    /// Overrides `options.minimum_keeping_source_backups`
    #[serde(default)]
    pub minimum_keeping_backups: Option<u32>,

    /// Overrides `options.cleanup_on_backup`
    #[serde(default)]
    pub cleanup_on_backup: Option<bool>,

    /// Driver specific settings
    #[serde(default)]
    pub options: toml::Table,
}

/// A `[[destinations]]` entry
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DestinationConfig {
    pub id: String,

    /// Either a path, or a directory type (`local`) configured by `options`
    pub directory: String,

    /// Days to keep backups; absent keeps them forever
    #[serde(default)]
    pub lifetime: Option<u32>,

    #[serde(default)]
    pub options: toml::Table,
}

/// The `[report]` table
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReportConfig {
    #[serde(default = "default_report_subject")]
    pub subject: String,

    pub sender: SenderConfig,

    #[serde(default)]
    pub receivers: Vec<ReceiverConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SenderConfig {
    #[serde(rename = "type", default)]
    pub mailer: MailerKind,

    #[serde(default)]
    pub options: MailerOptions,

    #[serde(default)]
    pub from: Option<FromAddress>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MailerKind {
    /// Local `sendmail` binary
    #[default]
    Mail,
    /// SMTP relay
    Smtp,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MailerOptions {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u32>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub auth_type: Option<String>,
    #[serde(default)]
    pub smtp_auth: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct FromAddress {
    pub address: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ReceiverConfig {
    #[serde(default)]
    pub name: String,
    pub mail: String,
}

// Default value functions

fn default_log_directory() -> PathBuf { PathBuf::from("~/logs/backuping") }
fn default_log_level() -> String { "info".to_string() }
fn default_log_max_files() -> u32 { 10 }
fn default_report_subject() -> String { "backup report".to_string() }
