//! dirsort - duplicate detection and rule-based file organization
//!
//! This library scans directory trees, finds files with identical content by
//! size bucketing and SHA-256 hashing, and moves files into folders chosen by
//! a destination rule. Every mutation goes through a [`FileSystem`] backend so
//! the same plan can be simulated with [`DryRunFileSystem`] or applied with
//! [`RealFileSystem`].

pub mod cli;
pub mod config;
pub mod dedupe;
pub mod entities;
pub mod file_organizer;
pub mod fs_provider;
pub mod hashing;
pub mod logging;
pub mod output;
pub mod rules;
pub mod scanner;

pub use config::{CompiledFilters, Config, ConfigError};
pub use dedupe::{DuplicateFinder, plan_duplicate_removal, reclaimable_bytes};
pub use entities::{ActionKind, ActionRecord, DuplicateGroups, FileRecord};
pub use file_organizer::{ExecutionReport, OrganizeError, Organizer};
pub use fs_provider::{DryRunFileSystem, FileSystem, RealFileSystem};
pub use hashing::{ContentHasher, HashError, HashService};
pub use logging::{EventSink, LogSink, MemorySink, NullSink};
pub use rules::{DestinationRule, RuleKind};
pub use scanner::{DirectoryScanner, Scan};

pub use cli::{Cli, run};
