//! Storage nodes that hold transportable backup units
//!
//! A destination owns one [`StorageNode`]. Only the local filesystem node
//! ships with the crate; the trait is the seam for remote nodes.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// File primitives the orchestrator needs from a destination directory
pub trait StorageNode: Send + Sync + fmt::Debug {
    /// Human readable location, used in logs and listings
    fn location(&self) -> String;

    /// Whether the node's root directory exists
    fn exists(&self) -> bool;

    /// Create the node's root directory and all parents
    fn create_dir_all(&self) -> io::Result<()>;

    /// Write a named file below the root
    fn write_file(&self, name: &str, contents: &[u8]) -> io::Result<()>;

    /// Read a named file below the root
    fn read_file(&self, name: &str) -> io::Result<Vec<u8>>;

    /// File names relative to the root, `/` separated, sorted
    ///
    /// A missing root lists as empty.
    fn list_files(&self, recursive: bool) -> io::Result<Vec<String>>;

    /// Copy a local file into the node under `name`
    ///
    /// `Ok(false)` means the node refused the copy without an I/O error.
    fn upload(&self, local: &Path, name: &str) -> io::Result<bool>;

    /// Copy a named file out of the node into `local`
    fn download(&self, name: &str, local: &Path) -> io::Result<()>;

    /// Delete a named file
    fn delete(&self, name: &str) -> io::Result<()>;

    /// Size of a named file in bytes
    fn size(&self, name: &str) -> io::Result<u64>;
}

/// A directory on the local filesystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDirectory {
    root: PathBuf,
}

impl LocalDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> io::Result<PathBuf> {
        let relative = Path::new(name);
        let escapes = relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir));
        if escapes || name.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid file name for {}: {:?}", self.root.display(), name),
            ));
        }
        Ok(self.root.join(relative))
    }
}

impl StorageNode for LocalDirectory {
    fn location(&self) -> String {
        self.root.display().to_string()
    }

    fn exists(&self) -> bool {
        self.root.is_dir()
    }

    fn create_dir_all(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root)
    }

    fn write_file(&self, name: &str, contents: &[u8]) -> io::Result<()> {
        let path = self.resolve(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)
    }

    fn read_file(&self, name: &str) -> io::Result<Vec<u8>> {
        fs::read(self.resolve(name)?)
    }

    fn list_files(&self, recursive: bool) -> io::Result<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let mut walker = WalkDir::new(&self.root).min_depth(1);
        if !recursive {
            walker = walker.max_depth(1);
        }

        let mut names = Vec::new();
        for entry in walker {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(name) = relative_path(entry.path(), &self.root) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    fn upload(&self, local: &Path, name: &str) -> io::Result<bool> {
        let target = self.resolve(name)?;
        debug!("Copying {:?} to {:?}", local, target);
        let copied = fs::copy(local, &target)?;
        let expected = fs::metadata(local)?.len();
        Ok(copied == expected)
    }

    fn download(&self, name: &str, local: &Path) -> io::Result<()> {
        let source = self.resolve(name)?;
        if let Some(parent) = local.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(source, local).map(|_| ())
    }

    fn delete(&self, name: &str) -> io::Result<()> {
        fs::remove_file(self.resolve(name)?)
    }

    fn size(&self, name: &str) -> io::Result<u64> {
        Ok(fs::metadata(self.resolve(name)?)?.len())
    }
}

/// Path of `path` relative to `ancestor`, `/` separated
///
/// Returns `None` when `path` is not below `ancestor`.
pub fn relative_path(path: &Path, ancestor: &Path) -> Option<String> {
    let stripped = path.strip_prefix(ancestor).ok()?;
    let parts: Vec<String> = stripped
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}
