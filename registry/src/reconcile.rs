//! Reconciling a directory tree with a desired set of files.
//!
//! The unit of change is a whole file. [`diff`] compares what is on disk
//! (restricted to the owned extensions) with what should be there, and
//! [`apply`] makes the disk match.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// A file to place in a tree, with a `/`-separated relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: String,
    pub content: String,
}

impl GeneratedFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Enumerates files under a root whose extension is in a filter list.
///
/// Each call to [`paths`](Self::paths) walks the tree afresh. A missing root
/// yields nothing.
#[derive(Debug, Clone)]
pub struct TreeWalker {
    root: PathBuf,
    extensions: Vec<String>,
}

impl TreeWalker {
    pub fn new(root: impl Into<PathBuf>, extensions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            root: root.into(),
            extensions: extensions.into_iter().map(Into::into).collect(),
        }
    }

    /// Lazily yields matching paths relative to the root, `/`-separated.
    pub fn paths(&self) -> impl Iterator<Item = String> + '_ {
        WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                e.path()
                    .extension()
                    .and_then(|x| x.to_str())
                    .is_some_and(|x| self.extensions.iter().any(|ext| ext == x))
            })
            .filter_map(|e| relative_path(&self.root, e.path()))
    }
}

fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<&str> = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    Some(parts.join("/"))
}

/// One whole-file change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileDiff {
    Add { path: String, content: String },
    Modify { path: String, content: String },
    Delete { path: String },
}

impl FileDiff {
    pub fn path(&self) -> &str {
        match self {
            FileDiff::Add { path, .. } | FileDiff::Modify { path, .. } | FileDiff::Delete { path } => path,
        }
    }
}

impl fmt::Display for FileDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileDiff::Add { path, .. } => write!(f, "[+ add] {path}"),
            FileDiff::Modify { path, .. } => write!(f, "[* mod] {path}"),
            FileDiff::Delete { path } => write!(f, "[- del] {path}"),
        }
    }
}

/// Computes the changes that turn `dir` into exactly `files`.
///
/// Only existing files with one of `extensions` are candidates for deletion;
/// anything else in the directory is left alone. Wanted files are compared
/// with what is on disk whatever their extension. The result is sorted by
/// path.
///
/// # Errors
///
/// Returns [`Io`](crate::Error::Io) if an existing file cannot be read.
pub fn diff(dir: &Path, extensions: &[String], files: &[GeneratedFile]) -> Result<Vec<FileDiff>> {
    let wanted: BTreeMap<&str, &str> = files
        .iter()
        .map(|f| (f.path.as_str(), f.content.as_str()))
        .collect();
    let walker = TreeWalker::new(dir, extensions.iter().cloned());

    let mut changes: Vec<FileDiff> = walker
        .paths()
        .filter(|path| !wanted.contains_key(path.as_str()))
        .map(|path| FileDiff::Delete { path })
        .collect();

    for (path, content) in wanted {
        if !dir.join(path).is_file() {
            changes.push(FileDiff::Add {
                path: path.to_string(),
                content: content.to_string(),
            });
            continue;
        }
        let current = std::fs::read(dir.join(path))?;
        if current != content.as_bytes() {
            changes.push(FileDiff::Modify {
                path: path.to_string(),
                content: content.to_string(),
            });
        }
    }

    changes.sort_by(|a, b| a.path().cmp(b.path()));
    Ok(changes)
}

/// Applies `changes` under `dir`.
///
/// Writes go to a temporary file in the destination directory that is then
/// renamed over the target.
///
/// # Errors
///
/// Returns [`Io`](crate::Error::Io) on directory creation, write or delete
/// failure, or [`Persist`](crate::Error::Persist) if the rename fails.
pub fn apply(dir: &Path, changes: &[FileDiff]) -> Result<()> {
    for change in changes {
        let path = dir.join(change.path());
        match change {
            FileDiff::Add { content, .. } | FileDiff::Modify { content, .. } => {
                debug!(path = %path.display(), "Writing file");
                write_atomic(&path, content)?;
            }
            FileDiff::Delete { .. } => {
                debug!(path = %path.display(), "Deleting file");
                match std::fs::remove_file(&path) {
                    Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e.into()),
                    _ => {}
                }
            }
        }
    }
    Ok(())
}

fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;
    let mut file = NamedTempFile::new_in(parent)?;
    file.write_all(content.as_bytes())?;
    file.flush()?;
    file.persist(path).map_err(|e| Error::Persist {
        path: path.display().to_string(),
        source: e.error,
    })?;
    Ok(())
}
