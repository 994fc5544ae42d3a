//! Choosing a backup to restore when several match

use super::naming::BackupName;
use dialoguer::{theme::ColorfulTheme, Select};
use tracing::{error, warn};

/// A backup file found on a destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: BackupName,
    pub destination_id: String,
    pub file_name: String,
}

impl Candidate {
    pub fn label(&self) -> String {
        format!(
            "{} ({}, on {})",
            self.file_name,
            self.name.captured_at(),
            self.destination_id
        )
    }
}

/// Picks one of several candidates, or none to skip the source
pub trait BackupSelector {
    fn select(&self, source_id: &str, candidates: &[Candidate]) -> Option<usize>;
}

/// Refuses to guess; the source is skipped
#[derive(Debug, Default, Clone, Copy)]
pub struct RejectAmbiguous;

impl BackupSelector for RejectAmbiguous {
    fn select(&self, source_id: &str, candidates: &[Candidate]) -> Option<usize> {
        error!(
            "{} backups found for source '{}'; pass --backup-name or --latest",
            candidates.len(),
            source_id
        );
        None
    }
}

/// Asks on the terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct InteractiveSelector;

impl BackupSelector for InteractiveSelector {
    fn select(&self, source_id: &str, candidates: &[Candidate]) -> Option<usize> {
        let mut items: Vec<String> = candidates.iter().map(Candidate::label).collect();
        items.push("skip".to_string());

        let choice = Select::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Select a backup to restore for '{}'", source_id))
            .items(&items)
            .default(0)
            .interact();

        match choice {
            Ok(index) if index < candidates.len() => Some(index),
            Ok(_) => None,
            Err(e) => {
                warn!("Selection prompt failed: {}", e);
                None
            }
        }
    }
}
