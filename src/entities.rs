//! Value types passed between the scanner, the duplicate finder and the organizer.
//!
//! Every type here is immutable once built. Stages that need to add information
//! (for example the content hash) produce a new value instead of mutating.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Snapshot of one file as seen during traversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time.
    pub modified: SystemTime,
    /// Hex content digest, filled in by the duplicate finder.
    pub hash: Option<String>,
}

impl FileRecord {
    pub fn new(path: impl Into<PathBuf>, size: u64, modified: SystemTime) -> Self {
        Self {
            path: path.into(),
            size,
            modified,
            hash: None,
        }
    }

    /// Returns a copy of this record carrying the given content hash.
    pub fn with_hash(&self, hash: impl Into<String>) -> Self {
        Self {
            hash: Some(hash.into()),
            ..self.clone()
        }
    }

    /// The final path component, if any.
    pub fn file_name(&self) -> Option<&std::ffi::OsStr> {
        self.path.file_name()
    }
}

/// Kind of filesystem mutation an [`ActionRecord`] stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Move,
    Delete,
    Copy,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ActionKind::Move => "MOVE",
            ActionKind::Delete => "DELETE",
            ActionKind::Copy => "COPY",
        };
        f.write_str(label)
    }
}

/// One planned filesystem mutation.
///
/// Built during planning and only read during execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionRecord {
    pub kind: ActionKind,
    pub source: PathBuf,
    /// Target path for moves and copies; `None` for deletes.
    pub destination: Option<PathBuf>,
    /// Human-readable reason shown in reports.
    pub reason: String,
}

impl ActionRecord {
    pub fn move_file(source: &Path, destination: PathBuf, reason: impl Into<String>) -> Self {
        Self {
            kind: ActionKind::Move,
            source: source.to_path_buf(),
            destination: Some(destination),
            reason: reason.into(),
        }
    }

    pub fn copy_file(source: &Path, destination: PathBuf, reason: impl Into<String>) -> Self {
        Self {
            kind: ActionKind::Copy,
            source: source.to_path_buf(),
            destination: Some(destination),
            reason: reason.into(),
        }
    }

    pub fn delete_file(source: &Path, reason: impl Into<String>) -> Self {
        Self {
            kind: ActionKind::Delete,
            source: source.to_path_buf(),
            destination: None,
            reason: reason.into(),
        }
    }
}

/// Content hash mapped to the files sharing it.
///
/// Every group holds at least two records of equal size and equal hash, in
/// traversal order. The map is ordered by hash so reports are stable.
pub type DuplicateGroups = BTreeMap<String, Vec<FileRecord>>;
