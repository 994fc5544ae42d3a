//! Zip packaging of directory-shaped backups

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Extensions whose contents are already compressed and are stored as-is
const STORED_EXTENSIONS: &[&str] = &[".zip", ".gz", ".tgz", ".zst", ".bz2", ".xz"];

/// Members at least this big need zip64 headers
const ZIP64_THRESHOLD: u64 = u32::MAX as u64;

/// One entry of a directory tree to package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Absolute path on disk
    pub path: PathBuf,
    /// `/` separated path inside the archive
    pub relative: String,
    pub is_dir: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("Archive I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Archive entry escapes the extraction directory: {0}")]
    UnsafeEntry(String),
}

fn is_precompressed(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    STORED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Write `entries` into a new zip file at `dest`
///
/// An empty entry list still produces a valid, empty archive.
pub fn create_archive(entries: &[TreeEntry], dest: &Path) -> Result<usize, ArchiveError> {
    let file = File::create(dest)?;
    let mut writer = ZipWriter::new(file);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    let mut files = 0;
    for entry in entries {
        if entry.is_dir {
            writer.add_directory(entry.relative.as_str(), stored)?;
            continue;
        }

        let mut input = File::open(&entry.path)?;
        let size = input.metadata()?.len();

        let options = if is_precompressed(&entry.relative) {
            stored
        } else {
            deflated
        };
        let options = options.large_file(size >= ZIP64_THRESHOLD);
        writer.start_file(entry.relative.as_str(), options)?;
        io::copy(&mut input, &mut writer)?;
        files += 1;
    }

    writer.finish()?;
    debug!("Packaged {} files into {:?}", files, dest);
    Ok(files)
}

/// Unpack a zip file into `dest`, creating it if needed
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<usize, ArchiveError> {
    let mut zip = ZipArchive::new(File::open(archive)?)?;
    fs::create_dir_all(dest)?;

    let mut files = 0;
    for index in 0..zip.len() {
        let mut entry = zip.by_index(index)?;
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| ArchiveError::UnsafeEntry(entry.name().to_string()))?;
        let target = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut output = File::create(&target)?;
        io::copy(&mut entry, &mut output)?;
        files += 1;
    }

    debug!("Extracted {} files from {:?}", files, archive);
    Ok(files)
}
