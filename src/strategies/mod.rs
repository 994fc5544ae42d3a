//! Backup drivers
//!
//! Every source kind implements [`BackupStrategy`]. The driver is chosen once
//! from the source's [`DriverKind`] by [`for_driver`]; drivers never keep state
//! between calls.

pub mod connection;
pub mod directory;
pub mod mongodb;
pub mod mysql;
pub mod options;
pub mod postgresql;

use crate::config::DriverKind;
use crate::utils::archive::TreeEntry;
use crate::utils::command::{ToolError, ToolInvocation};
use crate::utils::executor::CommandExecutor;
use crate::utils::storage::relative_path;
use directory::PathFilter;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Output;
use tempfile::TempDir;
use walkdir::WalkDir;

#[derive(Debug, thiserror::Error)]
pub enum StrategyError {
    #[error("Invalid {driver} options: {message}")]
    Validation {
        driver: &'static str,
        message: String,
    },

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StrategyError {
    pub fn validation(driver: &'static str, message: impl Into<String>) -> Self {
        StrategyError::Validation {
            driver,
            message: message.into(),
        }
    }
}

/// What a driver needs from the outside world
pub struct DriverContext<'a> {
    pub executor: &'a dyn CommandExecutor,
    /// Parent directory for dump scratch space
    pub scratch_root: &'a Path,
}

impl<'a> DriverContext<'a> {
    pub fn new(executor: &'a dyn CommandExecutor, scratch_root: &'a Path) -> Self {
        Self {
            executor,
            scratch_root,
        }
    }

    /// Fresh scratch directory, deleted when the returned handle drops
    pub fn scratch_dir(&self, prefix: &str) -> Result<TempDir, StrategyError> {
        std::fs::create_dir_all(self.scratch_root)?;
        Ok(tempfile::Builder::new()
            .prefix(prefix)
            .tempdir_in(self.scratch_root)?)
    }

    pub fn run(&self, invocation: &ToolInvocation) -> Result<Output, StrategyError> {
        Ok(self.executor.run(invocation)?)
    }
}

/// A single-file backup
#[derive(Debug)]
pub struct FileArtifact {
    path: PathBuf,
    _scratch: Option<TempDir>,
}

impl FileArtifact {
    /// A file living inside `scratch`, removed together with it
    pub fn in_scratch(path: PathBuf, scratch: TempDir) -> Self {
        Self {
            path,
            _scratch: Some(scratch),
        }
    }

    /// A file owned by someone else
    pub fn borrowed(path: PathBuf) -> Self {
        Self {
            path,
            _scratch: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A directory-shaped backup, possibly a filtered view of a live tree
#[derive(Debug)]
pub struct DirectoryArtifact {
    root: PathBuf,
    filter: PathFilter,
    _scratch: Option<TempDir>,
}

impl DirectoryArtifact {
    /// Read-only view of `root` with `filter` applied; nothing is copied
    pub fn view(root: PathBuf, filter: PathFilter) -> Self {
        Self {
            root,
            filter,
            _scratch: None,
        }
    }

    /// Everything inside a scratch directory, removed with the artifact
    pub fn scratch(scratch: TempDir) -> Self {
        Self {
            root: scratch.path().to_path_buf(),
            filter: PathFilter::default(),
            _scratch: Some(scratch),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Visible entries, excluded subtrees pruned, sorted by relative path
    pub fn entries(&self) -> Result<Vec<TreeEntry>, StrategyError> {
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| match relative_path(entry.path(), &self.root) {
                Some(relative) => !self.filter.is_excluded(&relative),
                None => true,
            });

        let mut entries = Vec::new();
        for entry in walker {
            let entry = entry.map_err(io::Error::from)?;
            let Some(relative) = relative_path(entry.path(), &self.root) else {
                continue;
            };
            let file_type = entry.file_type();
            if !(file_type.is_dir() || file_type.is_file()) {
                continue;
            }
            entries.push(TreeEntry {
                path: entry.path().to_path_buf(),
                relative,
                is_dir: file_type.is_dir(),
            });
        }
        Ok(entries)
    }

    /// Top-level files and directories, sorted by name
    pub fn top_level(&self) -> Result<Vec<PathBuf>, StrategyError> {
        let mut items = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            let excluded = relative_path(&path, &self.root)
                .map_or(false, |relative| self.filter.is_excluded(&relative));
            if !excluded {
                items.push(path);
            }
        }
        items.sort();
        Ok(items)
    }
}

/// Output of a driver's backup call, owned by the orchestrator
#[derive(Debug)]
pub enum Artifact {
    File(FileArtifact),
    Directory(DirectoryArtifact),
}

impl Artifact {
    pub fn is_directory(&self) -> bool {
        matches!(self, Artifact::Directory(_))
    }

    pub fn path(&self) -> &Path {
        match self {
            Artifact::File(file) => file.path(),
            Artifact::Directory(dir) => dir.root(),
        }
    }
}

/// Trait for backup drivers
pub trait BackupStrategy {
    /// Capture the source described by `options`
    fn backup(&self, options: &toml::Table, ctx: &DriverContext) -> Result<Artifact, StrategyError>;

    /// Put a previously captured artifact back into the source
    fn restore(
        &self,
        artifact: &Artifact,
        options: &toml::Table,
        ctx: &DriverContext,
    ) -> Result<(), StrategyError>;

    /// Get driver name (for logging)
    fn name(&self) -> &'static str;
}

/// Driver for a configured kind
pub fn for_driver(kind: DriverKind) -> Box<dyn BackupStrategy> {
    match kind {
        DriverKind::Directory => Box::new(directory::DirectoryStrategy),
        DriverKind::MySql => Box::new(mysql::MySqlStrategy),
        DriverKind::MongoDb => Box::new(mongodb::MongoDbStrategy),
        DriverKind::PostgreSql => Box::new(postgresql::PostgreSqlStrategy),
    }
}

/// Unix timestamp used in dump file names
pub(crate) fn capture_time() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Everything before the last `-` of a file stem, e.g. `app` for `app-1700000000.sql`
pub(crate) fn database_from_file_name(file_name: &str) -> Option<&str> {
    let stem = file_name.split('.').next().unwrap_or(file_name);
    stem.rfind('-')
        .map(|index| &stem[..index])
        .filter(|name| !name.is_empty())
}
