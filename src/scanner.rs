//! Directory traversal producing [`FileRecord`]s.
//!
//! The scan is lazy and depth-first. Unreadable directories and entries are
//! recorded as error strings and skipped; they never end the scan.

use crate::config::CompiledFilters;
use crate::entities::FileRecord;
use crate::fs_provider::{FileSystem, FsEntry};
use crate::logging::{EventSink, NullSink};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Builds scans over a [`FileSystem`].
pub struct DirectoryScanner<'a, F: FileSystem + ?Sized> {
    fs: &'a F,
    filters: Option<&'a CompiledFilters>,
    sink: Arc<dyn EventSink>,
}

impl<'a, F: FileSystem + ?Sized> DirectoryScanner<'a, F> {
    pub fn new(fs: &'a F) -> Self {
        Self {
            fs,
            filters: None,
            sink: Arc::new(NullSink),
        }
    }

    /// Only yield files accepted by these filters.
    pub fn with_filters(mut self, filters: &'a CompiledFilters) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Starts a scan of `root`.
    ///
    /// A missing root gives an empty scan with [`Scan::root_missing`] set.
    pub fn scan(&self, root: &Path) -> Scan<'a, F> {
        let root = std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf());
        self.sink
            .info(&format!("Scanning root: {}", root.display()));

        let mut scan = Scan {
            fs: self.fs,
            filters: self.filters,
            sink: Arc::clone(&self.sink),
            pending_root: None,
            stack: Vec::new(),
            errors: Vec::new(),
            root_missing: false,
        };

        if self.fs.exists(&root) {
            scan.pending_root = Some(root);
        } else {
            let message = format!("Root path does not exist: {}", root.display());
            self.sink.error(&message);
            scan.errors.push(message);
            scan.root_missing = true;
        }
        scan
    }
}

/// Lazy, single-pass sequence of file records.
///
/// A subdirectory is descended into as soon as it is met in its parent's
/// listing, so files come out in plain depth-first pre-order.
pub struct Scan<'a, F: FileSystem + ?Sized> {
    fs: &'a F,
    filters: Option<&'a CompiledFilters>,
    sink: Arc<dyn EventSink>,
    pending_root: Option<PathBuf>,
    /// Remaining entries of every directory on the current descent path.
    stack: Vec<std::vec::IntoIter<FsEntry>>,
    errors: Vec<String>,
    root_missing: bool,
}

impl<F: FileSystem + ?Sized> Scan<'_, F> {
    /// Descriptions of every entry or directory that could not be read.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn root_missing(&self) -> bool {
        self.root_missing
    }

    fn accepts(&self, path: &Path) -> bool {
        self.filters.is_none_or(|filters| filters.should_include(path))
    }

    /// Lists one directory and pushes its entries on the stack.
    fn descend(&mut self, dir: &Path) {
        let listing = match self.fs.list(dir) {
            Ok(listing) => listing,
            Err(e) => {
                self.sink
                    .warn(&format!("Cannot traverse {}: {}", dir.display(), e));
                self.errors
                    .push(format!("Cannot access directory: {}", dir.display()));
                return;
            }
        };

        for (path, e) in listing.failures {
            self.sink
                .warn(&format!("Skipping entry {}: {}", path.display(), e));
            self.errors.push(format!("Access denied: {}", path.display()));
        }

        self.stack.push(listing.entries.into_iter());
    }
}

impl<F: FileSystem + ?Sized> Iterator for Scan<'_, F> {
    type Item = FileRecord;

    fn next(&mut self) -> Option<FileRecord> {
        if let Some(root) = self.pending_root.take() {
            self.descend(&root);
        }

        loop {
            let entry = match self.stack.last_mut()?.next() {
                Some(entry) => entry,
                None => {
                    self.stack.pop();
                    continue;
                }
            };

            if entry.is_dir() {
                self.descend(&entry.path);
            } else if entry.is_file() && self.accepts(&entry.path) {
                return Some(FileRecord::new(entry.path, entry.size, entry.modified));
            }
        }
    }
}
