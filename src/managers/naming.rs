//! Transport unit file names
//!
//! `{source}-{unix}.zip` for file backups, `{source}-{unix}-directory.zip`
//! for packaged directory backups.

use regex::Regex;
use serde::Serialize;

const DIRECTORY_SUFFIX: &str = "-directory";

/// A parsed backup file name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupName {
    pub source_id: String,
    pub timestamp: i64,
    pub directory: bool,
}

impl BackupName {
    pub fn new(source_id: impl Into<String>, timestamp: i64, directory: bool) -> Self {
        Self {
            source_id: source_id.into(),
            timestamp,
            directory,
        }
    }

    pub fn file_name(&self) -> String {
        let suffix = if self.directory { DIRECTORY_SUFFIX } else { "" };
        format!("{}-{}{}.zip", self.source_id, self.timestamp, suffix)
    }

    /// Parse `name` as a backup of `source_id`
    ///
    /// Only bare file names match; listings with sub paths are ignored.
    pub fn parse(source_id: &str, name: &str) -> Option<Self> {
        let pattern = format!(
            r"^{}-(\d+)({})?\.zip$",
            regex::escape(source_id),
            DIRECTORY_SUFFIX
        );
        let captures = Regex::new(&pattern).ok()?.captures(name)?;
        let timestamp = captures.get(1)?.as_str().parse().ok()?;

        Some(Self {
            source_id: source_id.to_string(),
            timestamp,
            directory: captures.get(2).is_some(),
        })
    }

    /// Human readable capture time
    pub fn captured_at(&self) -> String {
        chrono::DateTime::from_timestamp(self.timestamp, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| self.timestamp.to_string())
    }
}
