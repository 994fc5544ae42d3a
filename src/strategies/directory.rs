//! Filesystem tree driver
//!
//! Backup hands out a filtered, read-only view of the tree; nothing is
//! copied until the orchestrator packages it.

use super::options::{get_str, get_string_list};
use super::{Artifact, BackupStrategy, DirectoryArtifact, DriverContext, StrategyError};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const DRIVER: &str = "directory";

/// One exclude pattern: `/regex/` or a literal substring
#[derive(Debug, Clone)]
enum ExcludePattern {
    Substring(String),
    Regex(Regex),
}

/// Exclude patterns matched against `/` separated relative paths
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    patterns: Vec<ExcludePattern>,
}

impl PathFilter {
    pub fn parse(patterns: &[String]) -> Result<Self, StrategyError> {
        let patterns = patterns
            .iter()
            .filter(|p| !p.is_empty())
            .map(|pattern| {
                let is_regex = pattern.len() > 2 && pattern.starts_with('/') && pattern.ends_with('/');
                if is_regex {
                    let body = &pattern[1..pattern.len() - 1];
                    Regex::new(body).map(ExcludePattern::Regex).map_err(|e| {
                        StrategyError::validation(
                            DRIVER,
                            format!("invalid exclude pattern '{}': {}", pattern, e),
                        )
                    })
                } else {
                    Ok(ExcludePattern::Substring(pattern.clone()))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn is_excluded(&self, relative: &str) -> bool {
        self.patterns.iter().any(|pattern| match pattern {
            ExcludePattern::Substring(needle) => relative.contains(needle.as_str()),
            ExcludePattern::Regex(regex) => regex.is_match(relative),
        })
    }
}

pub struct DirectoryStrategy;

impl DirectoryStrategy {
    fn root(options: &toml::Table) -> Result<PathBuf, StrategyError> {
        match get_str(DRIVER, options, "directory")? {
            Some(path) if !path.trim().is_empty() => Ok(crate::config::expand_tilde(Path::new(path))),
            _ => Err(StrategyError::validation(
                DRIVER,
                "you should pass a non-empty 'directory' option",
            )),
        }
    }
}

impl BackupStrategy for DirectoryStrategy {
    fn backup(&self, options: &toml::Table, _ctx: &DriverContext) -> Result<Artifact, StrategyError> {
        let root = Self::root(options)?;
        if !root.is_dir() {
            return Err(StrategyError::validation(
                DRIVER,
                format!("the directory {:?} does not exist", root),
            ));
        }

        let excludes = get_string_list(DRIVER, options, &["exclude"])?;
        let filter = PathFilter::parse(&excludes)?;

        info!(
            "Backing up directory {:?} ({} exclude patterns)",
            root,
            excludes.len()
        );

        Ok(Artifact::Directory(DirectoryArtifact::view(root, filter)))
    }

    fn restore(
        &self,
        artifact: &Artifact,
        options: &toml::Table,
        _ctx: &DriverContext,
    ) -> Result<(), StrategyError> {
        let target = Self::root(options)?;
        fs::create_dir_all(&target)?;

        let source = match artifact {
            Artifact::Directory(dir) => dir,
            Artifact::File(_) => {
                return Err(StrategyError::validation(
                    DRIVER,
                    "only directory backups can be restored into a directory source",
                ))
            }
        };

        let mut restored = 0;
        for entry in source.entries()? {
            let destination = target.join(&entry.relative);
            if entry.is_dir {
                fs::create_dir_all(&destination)?;
                continue;
            }
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent)?;
            }
            debug!("Restoring {}", entry.relative);
            fs::copy(&entry.path, &destination)?;
            restored += 1;
        }

        info!("Restored {} files into {:?}", restored, target);
        Ok(())
    }

    fn name(&self) -> &'static str {
        DRIVER
    }
}
