//! Destination rules: where a file belongs under the organize root.
//!
//! Rules are pure functions of the record and the root; they never touch disk.
//!
//! ```
//! use dirsort::entities::FileRecord;
//! use dirsort::rules::DestinationRule;
//! use std::path::Path;
//! use std::time::SystemTime;
//!
//! let record = FileRecord::new("/r/inbox/photo.JPG", 10, SystemTime::now());
//! let target = DestinationRule::Extension.destination(&record, Path::new("/r"));
//! assert_eq!(target, Path::new("/r/JPG"));
//! ```

use crate::entities::FileRecord;
use chrono::{DateTime, Datelike, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Folder for files without an extension.
pub const MISC_DIR: &str = "Misc";

/// Rule selector used by the configuration file and the CLI.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    #[default]
    Extension,
    Date,
}

impl From<RuleKind> for DestinationRule {
    fn from(kind: RuleKind) -> Self {
        match kind {
            RuleKind::Extension => DestinationRule::Extension,
            RuleKind::Date => DestinationRule::Date,
        }
    }
}

/// Maps a file to the directory it should live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationRule {
    /// `root/EXT`, or `root/Misc` when there is no extension.
    Extension,
    /// `root/YYYY/MM` from the modification time in local time.
    Date,
}

impl DestinationRule {
    pub fn destination(&self, record: &FileRecord, root: &Path) -> PathBuf {
        match self {
            DestinationRule::Extension => {
                let ext = record
                    .path
                    .extension()
                    .map(|e| e.to_string_lossy().trim_start_matches('.').to_uppercase())
                    .unwrap_or_default();
                if ext.is_empty() {
                    root.join(MISC_DIR)
                } else {
                    root.join(ext)
                }
            }
            DestinationRule::Date => {
                let local: DateTime<Local> = record.modified.into();
                root.join(format!("{:04}", local.year()))
                    .join(format!("{:02}", local.month()))
            }
        }
    }

    /// Name used in plan reasons.
    pub fn name(&self) -> &'static str {
        match self {
            DestinationRule::Extension => "ExtensionRule",
            DestinationRule::Date => "DateRule",
        }
    }
}
