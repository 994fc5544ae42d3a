use super::types::*;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Source '{0}' not found")]
    SourceNotFound(String),

    #[error("Destination '{0}' not found")]
    DestinationNotFound(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "warning", "error"];
const REMOTE_DIRECTORY_TYPES: &[&str] = &["ftp", "sftp", "scp", "s3"];

/// Load and validate configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Parse and validate configuration from a TOML string
pub fn parse_config(contents: &str) -> Result<Config> {
    let config: Config = toml::from_str(contents)?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate the configuration
fn validate_config(config: &Config) -> Result<()> {
    if !LOG_LEVELS.contains(&config.options.log_level.to_lowercase().as_str()) {
        return Err(ConfigError::ValidationError(format!(
            "Invalid log level: {}",
            config.options.log_level
        )));
    }

    validate_ids("source", config.sources.iter().map(|s| s.id.as_str()))?;
    validate_ids("destination", config.destinations.iter().map(|d| d.id.as_str()))?;

    for destination in &config.destinations {
        resolve_directory(destination)?;
        if let Some(port) = destination.options.get("port") {
            validate_port_value(&format!("destination '{}'", destination.id), port)?;
        }
    }

    if let Some(ref report) = config.report {
        validate_report(report)?;
    }

    Ok(())
}

/// Ids must be present, non-empty, usable in file names and unique
pub(crate) fn validate_ids<'a>(kind: &str, ids: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();

    for id in ids {
        if id.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "A {} has an empty id",
                kind
            )));
        }
        if id.contains(['/', '\\']) {
            return Err(ConfigError::ValidationError(format!(
                "The {} id '{}' must not contain path separators",
                kind, id
            )));
        }
        if !seen.insert(id) {
            return Err(ConfigError::ValidationError(format!(
                "Duplicate {} id: {}",
                kind, id
            )));
        }
    }

    if seen.is_empty() {
        return Err(ConfigError::ValidationError(format!("No {}s defined", kind)));
    }

    Ok(())
}

/// Resolve a destination's directory selector to a local path
///
/// A selector containing `/` or starting with `.` is a path; `local` reads
/// `options.path`. Remote directory types are rejected.
pub fn resolve_directory(destination: &DestinationConfig) -> Result<PathBuf> {
    let selector = destination.directory.trim();

    if selector.contains('/') || selector.starts_with('.') || selector.starts_with('~') {
        return Ok(super::expand_tilde(Path::new(selector)));
    }

    let kind = selector.to_lowercase();
    if kind == "local" {
        return match destination.options.get("path").and_then(|v| v.as_str()) {
            Some(path) if !path.trim().is_empty() => Ok(super::expand_tilde(Path::new(path))),
            _ => Err(ConfigError::ValidationError(format!(
                "Destination '{}': local directory requires a non-empty options.path",
                destination.id
            ))),
        };
    }

    if REMOTE_DIRECTORY_TYPES.contains(&kind.as_str()) {
        return Err(ConfigError::ValidationError(format!(
            "Destination '{}': '{}' directories are not supported",
            destination.id, selector
        )));
    }

    Err(ConfigError::ValidationError(format!(
        "Destination '{}': unknown directory '{}'",
        destination.id, selector
    )))
}

fn validate_port_value(owner: &str, value: &toml::Value) -> Result<()> {
    let port = match value {
        toml::Value::Integer(i) => Some(*i),
        toml::Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    match port {
        Some(p) if (1..=65535).contains(&p) => Ok(()),
        _ => Err(ConfigError::ValidationError(format!(
            "{}: port must be a number between 1 and 65535, got {}",
            owner, value
        ))),
    }
}

/// Header fields end up on single mail header lines
fn reject_line_breaks(field: &str, value: &str) -> Result<()> {
    if value.contains(['\r', '\n']) {
        return Err(ConfigError::ValidationError(format!(
            "Report {} must not contain line breaks",
            field
        )));
    }
    Ok(())
}

fn validate_report(report: &ReportConfig) -> Result<()> {
    reject_line_breaks("subject", &report.subject)?;
    if let Some(ref from) = report.sender.from {
        reject_line_breaks("sender name", &from.name)?;
        reject_line_breaks("sender address", &from.address)?;
    }
    for receiver in &report.receivers {
        reject_line_breaks("receiver name", &receiver.name)?;
        reject_line_breaks("receiver mail", &receiver.mail)?;
    }

    if report.receivers.is_empty() {
        return Err(ConfigError::ValidationError(
            "Report has no receivers".to_string(),
        ));
    }

    for receiver in &report.receivers {
        if !receiver.mail.contains('@') {
            return Err(ConfigError::ValidationError(format!(
                "Report receiver '{}' has an invalid mail address: '{}'",
                receiver.name, receiver.mail
            )));
        }
    }

    if let Some(ref from) = report.sender.from {
        if !from.address.contains('@') {
            return Err(ConfigError::ValidationError(format!(
                "Report sender has an invalid from address: '{}'",
                from.address
            )));
        }
    }

    let options = &report.sender.options;
    if let Some(port) = options.port {
        if !(1..=65535).contains(&port) {
            return Err(ConfigError::ValidationError(format!(
                "Report sender port must be between 1 and 65535, got {}",
                port
            )));
        }
    }

    if report.sender.mailer == MailerKind::Smtp
        && options.host.as_deref().map_or(true, |h| h.trim().is_empty())
    {
        return Err(ConfigError::ValidationError(
            "Report sender of type 'smtp' requires options.host".to_string(),
        ));
    }

    Ok(())
}
