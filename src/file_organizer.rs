//! Planning and executing file moves.
//!
//! The organizer turns file records into an ordered plan of [`ActionRecord`]s
//! using a [`DestinationRule`], then carries the plan out against a
//! [`FileSystem`]. Collision checks during planning go through the same
//! backend that executes the plan, so a dry run resolves names exactly the way
//! a live run would.

use crate::entities::{ActionKind, ActionRecord, FileRecord};
use crate::fs_provider::FileSystem;
use crate::logging::{EventSink, NullSink};
use crate::rules::DestinationRule;
use serde::Serialize;
use std::collections::HashSet;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Contract violations detected while planning.
///
/// These indicate a bad record or rule, not an environmental problem, and
/// abort planning.
#[derive(Debug, thiserror::Error)]
pub enum OrganizeError {
    /// A record's path has no final component to reuse as the file name.
    #[error("cannot organize {}: path has no file name", .path.display())]
    MissingFileName { path: PathBuf },
    /// A rule produced a directory outside the organize root.
    #[error(
        "rule {rule} sent {} outside of root {}",
        .destination.display(),
        .root.display()
    )]
    DestinationOutsideRoot {
        rule: &'static str,
        destination: PathBuf,
        root: PathBuf,
    },
}

/// Result type for planning.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

/// Outcome of [`Organizer::execute_plan`].
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionReport {
    /// Number of actions that completed.
    pub succeeded: usize,
    /// Source path and error message of every action that failed.
    pub failures: Vec<(PathBuf, String)>,
}

impl ExecutionReport {
    /// Number of actions that failed.
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Number of actions attempted.
    pub fn total(&self) -> usize {
        self.succeeded + self.failed()
    }

    /// True when no action failed, including for an empty plan.
    pub fn is_complete_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Builds and runs move plans against one filesystem backend.
pub struct Organizer<F: FileSystem> {
    fs: F,
    sink: Arc<dyn EventSink>,
}

impl<F: FileSystem> Organizer<F> {
    /// Creates an organizer over `fs` that logs nothing.
    pub fn new(fs: F) -> Self {
        Self {
            fs,
            sink: Arc::new(NullSink),
        }
    }

    /// Routes planning and execution events to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// The backend plans are checked against and executed on.
    pub fn fs(&self) -> &F {
        &self.fs
    }

    /// Plans one move per record that is not already where `rule` wants it.
    ///
    /// Targets are `rule.destination(record, root) / file name`, renamed with
    /// `_1`, `_2`, ... when taken. A target claimed by an earlier action of the
    /// same plan counts as taken.
    ///
    /// # Errors
    ///
    /// Fails on the first record without a file name or the first destination
    /// outside `root`.
    pub fn plan_organization<I>(
        &self,
        records: I,
        rule: &DestinationRule,
        root: &Path,
    ) -> OrganizeResult<Vec<ActionRecord>>
    where
        I: IntoIterator<Item = FileRecord>,
    {
        let root = std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf());
        let reason = format!("Organized by {}", rule.name());
        let mut reserved: HashSet<PathBuf> = HashSet::new();
        let mut plan = Vec::new();

        for record in records {
            let file_name = record
                .file_name()
                .ok_or_else(|| OrganizeError::MissingFileName {
                    path: record.path.clone(),
                })?;

            let target_dir = rule.destination(&record, &root);
            if !target_dir.starts_with(&root) {
                return Err(OrganizeError::DestinationOutsideRoot {
                    rule: rule.name(),
                    destination: target_dir,
                    root,
                });
            }

            let target = target_dir.join(file_name);
            if target == record.path {
                self.sink
                    .debug(&format!("Already in place: {}", record.path.display()));
                continue;
            }

            let safe_target = self.resolve_reserved(&target, &reserved);
            if safe_target == record.path {
                continue;
            }

            reserved.insert(safe_target.clone());
            plan.push(ActionRecord::move_file(
                &record.path,
                safe_target,
                reason.clone(),
            ));
        }

        self.sink
            .info(&format!("Planned {} operations", plan.len()));
        Ok(plan)
    }

    /// Returns `target`, or the first free `stem_N.ext` next to it.
    pub fn resolve_collision(&self, target: &Path) -> PathBuf {
        self.resolve_reserved(target, &HashSet::new())
    }

    fn resolve_reserved(&self, target: &Path, reserved: &HashSet<PathBuf>) -> PathBuf {
        let taken = |path: &Path| reserved.contains(path) || self.fs.exists(path);
        if !taken(target) {
            return target.to_path_buf();
        }

        let parent = target.parent().unwrap_or_else(|| Path::new(""));
        let stem = target.file_stem().unwrap_or_default();
        let extension = target.extension();

        let mut counter: u64 = 1;
        loop {
            let mut name = OsString::from(stem);
            name.push(format!("_{}", counter));
            if let Some(ext) = extension {
                name.push(".");
                name.push(ext);
            }
            let candidate = parent.join(name);
            if !taken(&candidate) {
                return candidate;
            }
            counter += 1;
        }
    }

    /// Runs every action in order, continuing past failures.
    pub fn execute_plan(&mut self, plan: &[ActionRecord]) -> ExecutionReport {
        self.execute_plan_with_progress(plan, |_, _| {})
    }

    /// Like [`Organizer::execute_plan`], calling `on_step` with the 1-based
    /// index of each action before it runs.
    pub fn execute_plan_with_progress<P>(
        &mut self,
        plan: &[ActionRecord],
        mut on_step: P,
    ) -> ExecutionReport
    where
        P: FnMut(usize, &ActionRecord),
    {
        self.sink
            .info(&format!("Executing {} operations", plan.len()));
        let mut report = ExecutionReport::default();

        for (index, action) in plan.iter().enumerate() {
            on_step(index + 1, action);
            match self.apply(action) {
                Ok(()) => report.succeeded += 1,
                Err(e) => {
                    self.sink.error(&format!(
                        "Failed to {} {}: {}",
                        verb(action.kind),
                        action.source.display(),
                        e
                    ));
                    report
                        .failures
                        .push((action.source.clone(), e.to_string()));
                }
            }
        }

        self.sink.info(&format!(
            "Execution complete. Success: {}, Failed: {}",
            report.succeeded,
            report.failed()
        ));
        report
    }

    fn apply(&mut self, action: &ActionRecord) -> io::Result<()> {
        match action.kind {
            ActionKind::Delete => self.fs.delete(&action.source),
            ActionKind::Move | ActionKind::Copy => {
                let destination = action.destination.as_deref().ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidInput, "action has no destination")
                })?;
                if let Some(parent) = destination.parent() {
                    self.fs.mkdir(parent)?;
                }
                if action.kind == ActionKind::Move {
                    self.fs.move_file(&action.source, destination)
                } else {
                    self.fs.copy_file(&action.source, destination)
                }
            }
        }
    }

    /// Removes empty directories under and including `root`, deepest first.
    ///
    /// Returns how many directories were removed. Directories that cannot be
    /// listed or removed are logged and skipped.
    pub fn cleanup_empty_dirs(&mut self, root: &Path) -> usize {
        self.remove_empty_recursive(root)
    }

    fn remove_empty_recursive(&mut self, path: &Path) -> usize {
        if !self.fs.exists(path) {
            return 0;
        }

        let listing = match self.fs.list(path) {
            Ok(listing) => listing,
            Err(e) => {
                self.sink
                    .warn(&format!("Cannot list {}: {}", path.display(), e));
                return 0;
            }
        };

        let mut removed = 0;
        for entry in listing.entries.iter().filter(|e| e.is_dir()) {
            removed += self.remove_empty_recursive(&entry.path);
        }

        match self.fs.list(path) {
            Ok(after) if after.is_empty() => match self.fs.rmdir(path) {
                Ok(()) => {
                    self.sink
                        .info(&format!("Removing empty directory: {}", path.display()));
                    removed += 1;
                }
                Err(e) => self
                    .sink
                    .warn(&format!("Cannot remove {}: {}", path.display(), e)),
            },
            Ok(_) => {}
            Err(e) => self
                .sink
                .warn(&format!("Cannot list {}: {}", path.display(), e)),
        }
        removed
    }
}

fn verb(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::Move => "move",
        ActionKind::Copy => "copy",
        ActionKind::Delete => "delete",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs_provider::{DirListing, DryRunFileSystem, EntryKind, FsEntry, RealFileSystem};
    use crate::logging::MemorySink;
    use std::collections::{HashMap, HashSet};
    use std::fs;
    use std::time::SystemTime;
    use tempfile::TempDir;

    /// In-memory backend: a set of existing paths and scripted listings.
    #[derive(Default)]
    struct MockFs {
        existing: HashSet<PathBuf>,
        dirs: HashMap<PathBuf, Vec<PathBuf>>,
        locked: HashSet<PathBuf>,
        fail_moves: bool,
        moves: Vec<(PathBuf, PathBuf)>,
        removed_dirs: Vec<PathBuf>,
    }

    impl FileSystem for MockFs {
        fn list(&self, dir: &Path) -> io::Result<DirListing> {
            if self.locked.contains(dir) {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "locked"));
            }
            let entries = self
                .dirs
                .get(dir)
                .map(|children| {
                    children
                        .iter()
                        .filter(|c| !self.removed_dirs.contains(c))
                        .map(|c| FsEntry {
                            path: c.clone(),
                            name: c.file_name().unwrap().to_string_lossy().into_owned(),
                            kind: if self.dirs.contains_key(c) {
                                EntryKind::Directory
                            } else {
                                EntryKind::File
                            },
                            size: 0,
                            modified: SystemTime::UNIX_EPOCH,
                        })
                        .collect()
                })
                .unwrap_or_default();
            Ok(DirListing {
                entries,
                failures: Vec::new(),
            })
        }

        fn move_file(&mut self, source: &Path, destination: &Path) -> io::Result<()> {
            if self.fail_moves {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "Access Denied"));
            }
            self.moves.push((source.to_path_buf(), destination.to_path_buf()));
            Ok(())
        }

        fn copy_file(&mut self, _: &Path, _: &Path) -> io::Result<()> {
            Ok(())
        }

        fn delete(&mut self, _: &Path) -> io::Result<()> {
            Ok(())
        }

        fn exists(&self, path: &Path) -> bool {
            self.existing.contains(path) || self.dirs.contains_key(path)
        }

        fn mkdir(&mut self, _: &Path) -> io::Result<()> {
            Ok(())
        }

        fn rmdir(&mut self, path: &Path) -> io::Result<()> {
            self.removed_dirs.push(path.to_path_buf());
            Ok(())
        }
    }

    fn record(path: &str) -> FileRecord {
        FileRecord::new(path, 100, SystemTime::UNIX_EPOCH)
    }

    #[test]
    fn test_collision_resolution_linear_probing() {
        let mut fs = MockFs::default();
        fs.existing.insert(PathBuf::from("/data/doc.txt"));
        fs.existing.insert(PathBuf::from("/data/doc_1.txt"));
        let organizer = Organizer::new(fs);

        assert_eq!(
            organizer.resolve_collision(Path::new("/data/doc.txt")),
            PathBuf::from("/data/doc_2.txt")
        );
        assert_eq!(
            organizer.resolve_collision(Path::new("/data/new.txt")),
            PathBuf::from("/data/new.txt")
        );
    }

    #[test]
    fn test_collision_without_extension() {
        let mut fs = MockFs::default();
        fs.existing.insert(PathBuf::from("/data/Makefile"));
        let organizer = Organizer::new(fs);

        assert_eq!(
            organizer.resolve_collision(Path::new("/data/Makefile")),
            PathBuf::from("/data/Makefile_1")
        );
    }

    #[test]
    fn test_plan_by_extension() {
        let organizer = Organizer::new(MockFs::default());
        let plan = organizer
            .plan_organization(
                vec![record("/r/image.png"), record("/r/doc.pdf")],
                &DestinationRule::Extension,
                Path::new("/r"),
            )
            .expect("plan failed");

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].source, PathBuf::from("/r/image.png"));
        assert_eq!(plan[0].destination, Some(PathBuf::from("/r/PNG/image.png")));
        assert_eq!(plan[1].destination, Some(PathBuf::from("/r/PDF/doc.pdf")));
        assert!(plan.iter().all(|a| a.kind == ActionKind::Move));
        assert_eq!(plan[0].reason, "Organized by ExtensionRule");
    }

    #[test]
    fn test_plan_skips_files_already_in_place() {
        let mut fs = MockFs::default();
        // the file itself exists, which must not trigger a rename
        fs.existing.insert(PathBuf::from("/tmp/TXT/doc.txt"));
        let organizer = Organizer::new(fs);

        let plan = organizer
            .plan_organization(
                vec![record("/tmp/TXT/doc.txt")],
                &DestinationRule::Extension,
                Path::new("/tmp"),
            )
            .unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_plan_reserves_targets_within_one_plan() {
        let organizer = Organizer::new(MockFs::default());
        let plan = organizer
            .plan_organization(
                vec![record("/r/a/notes.txt"), record("/r/b/notes.txt")],
                &DestinationRule::Extension,
                Path::new("/r"),
            )
            .unwrap();

        assert_eq!(plan[0].destination, Some(PathBuf::from("/r/TXT/notes.txt")));
        assert_eq!(plan[1].destination, Some(PathBuf::from("/r/TXT/notes_1.txt")));
    }

    #[test]
    fn test_plan_rejects_record_without_file_name() {
        let organizer = Organizer::new(MockFs::default());
        let result = organizer.plan_organization(
            vec![record("/")],
            &DestinationRule::Extension,
            Path::new("/r"),
        );
        assert!(matches!(result, Err(OrganizeError::MissingFileName { .. })));
    }

    #[test]
    fn test_execute_plan_continues_past_failures() {
        let fs = MockFs {
            fail_moves: true,
            ..Default::default()
        };
        let sink = Arc::new(MemorySink::new());
        let mut organizer = Organizer::new(fs).with_sink(sink.clone());

        let plan = vec![
            ActionRecord::move_file(Path::new("src"), PathBuf::from("dest"), "test"),
            ActionRecord::delete_file(Path::new("other"), "test"),
        ];
        let mut steps = Vec::new();
        let report = organizer.execute_plan_with_progress(&plan, |i, _| steps.push(i));

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.failures[0].0, PathBuf::from("src"));
        assert_eq!(steps, vec![1, 2]);
        assert!(sink.text().contains("Failed to move src"));
        assert!(sink.text().contains("Execution complete. Success: 1, Failed: 1"));
    }

    #[test]
    fn test_cleanup_removes_only_empty_dirs() {
        let root = PathBuf::from("/root");
        let empty_dir = root.join("empty_dir");
        let kept_dir = root.join("kept_dir");
        let mut fs = MockFs::default();
        fs.dirs
            .insert(root.clone(), vec![empty_dir.clone(), kept_dir.clone()]);
        fs.dirs.insert(empty_dir.clone(), Vec::new());
        fs.dirs.insert(kept_dir.clone(), vec![kept_dir.join("file.txt")]);

        let mut organizer = Organizer::new(fs);
        let removed = organizer.cleanup_empty_dirs(&root);

        assert_eq!(removed, 1);
        assert_eq!(organizer.fs().removed_dirs, vec![empty_dir]);
    }

    #[test]
    fn test_cleanup_missing_root_is_noop() {
        let mut organizer = Organizer::new(MockFs::default());
        assert_eq!(organizer.cleanup_empty_dirs(Path::new("/missing")), 0);
        assert!(organizer.fs().removed_dirs.is_empty());
    }

    #[test]
    fn test_cleanup_skips_locked_dirs() {
        let root = PathBuf::from("/root");
        let locked = root.join("locked");
        let empty = root.join("empty");
        let mut fs = MockFs::default();
        fs.dirs.insert(root.clone(), vec![locked.clone(), empty.clone()]);
        fs.dirs.insert(locked.clone(), Vec::new());
        fs.dirs.insert(empty.clone(), Vec::new());
        fs.locked.insert(locked.clone());

        let sink = Arc::new(MemorySink::new());
        let mut organizer = Organizer::new(fs).with_sink(sink.clone());
        organizer.cleanup_empty_dirs(&root);

        assert_eq!(organizer.fs().removed_dirs, vec![empty]);
        assert!(sink.text().contains("Cannot list /root/locked"));
    }

    #[test]
    fn test_real_execution_moves_files() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::write(root.join("a.txt"), "a").unwrap();

        let mut organizer = Organizer::new(RealFileSystem::new());
        let plan = organizer
            .plan_organization(
                vec![record(root.join("a.txt").to_str().unwrap())],
                &DestinationRule::Extension,
                root,
            )
            .unwrap();
        let report = organizer.execute_plan(&plan);

        assert!(report.is_complete_success());
        assert!(root.join("TXT").join("a.txt").is_file());
        assert!(!root.join("a.txt").exists());
    }

    #[test]
    fn test_real_execution_copies_into_new_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        let source = root.join("report.pdf");
        fs::write(&source, "pdf").unwrap();
        let target = root.join("archive").join("2024").join("report.pdf");

        let mut organizer = Organizer::new(RealFileSystem::new());
        let plan = vec![ActionRecord::copy_file(&source, target.clone(), "backup")];
        let report = organizer.execute_plan(&plan);

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.total(), 1);
        assert_eq!(fs::read_to_string(&source).unwrap(), "pdf");
        assert_eq!(fs::read_to_string(&target).unwrap(), "pdf");
    }

    #[test]
    fn test_copy_over_existing_file_is_reported() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        let source = root.join("a.txt");
        let target = root.join("b.txt");
        fs::write(&source, "new").unwrap();
        fs::write(&target, "old").unwrap();

        let mut organizer = Organizer::new(RealFileSystem::new());
        let report =
            organizer.execute_plan(&[ActionRecord::copy_file(&source, target.clone(), "t")]);

        assert_eq!(report.failed(), 1);
        assert_eq!(report.failures[0].0, source);
        assert_eq!(fs::read_to_string(&target).unwrap(), "old");
    }

    #[test]
    fn test_dry_run_sees_its_own_moves() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::write(root.join("a.txt"), "a").unwrap();

        let mut organizer = Organizer::new(DryRunFileSystem::new(Arc::new(MemorySink::new())));
        let target = root.join("TXT").join("a.txt");
        let plan = vec![ActionRecord::move_file(&root.join("a.txt"), target.clone(), "t")];
        organizer.execute_plan(&plan);

        // a second file aimed at the same name now probes past it
        assert_eq!(
            organizer.resolve_collision(&target),
            root.join("TXT").join("a_1.txt")
        );
        assert!(!root.join("TXT").exists());
    }
}
