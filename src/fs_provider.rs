//! Filesystem backends.
//!
//! All mutating work in the crate goes through [`FileSystem`]. Two backends
//! share that contract:
//!
//! - [`RealFileSystem`] performs the I/O directly.
//! - [`DryRunFileSystem`] answers reads from disk, logs every mutation instead
//!   of performing it, and remembers virtual moves so that later `exists`
//!   checks see the files where a live run would have put them.
//!
//! Business logic takes a `FileSystem` and never asks which one it got.

use crate::logging::EventSink;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

/// Type of a directory entry, read without following symlinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    /// Symlinks, sockets, devices.
    Other,
}

/// One entry returned by [`FileSystem::list`].
#[derive(Debug, Clone)]
pub struct FsEntry {
    /// Full path: the listed directory joined with `name`.
    pub path: PathBuf,
    /// Final path component, lossily converted to UTF-8.
    pub name: String,
    pub kind: EntryKind,
    /// Size in bytes; for symlinks, the size of the link itself.
    pub size: u64,
    /// Last modification time.
    pub modified: SystemTime,
}

impl FsEntry {
    /// True for real directories, never for symlinks to one.
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

/// Contents of one directory.
///
/// Entries that could be named but not stat'ed end up in `failures` so a
/// single unreadable entry does not hide its siblings.
#[derive(Debug, Default)]
pub struct DirListing {
    pub entries: Vec<FsEntry>,
    pub failures: Vec<(PathBuf, io::Error)>,
}

impl DirListing {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.failures.is_empty()
    }
}

/// Capability set shared by the live and simulated backends.
pub trait FileSystem {
    /// Lists the direct children of `dir`.
    fn list(&self, dir: &Path) -> io::Result<DirListing>;

    /// Moves `source` to `destination`.
    fn move_file(&mut self, source: &Path, destination: &Path) -> io::Result<()>;

    /// Copies `source` to `destination`.
    fn copy_file(&mut self, source: &Path, destination: &Path) -> io::Result<()>;

    /// Permanently deletes a file.
    fn delete(&mut self, path: &Path) -> io::Result<()>;

    fn exists(&self, path: &Path) -> bool;

    /// Creates `path` and any missing parents. Succeeds if it already exists.
    fn mkdir(&mut self, path: &Path) -> io::Result<()>;

    /// Removes one empty directory.
    fn rmdir(&mut self, path: &Path) -> io::Result<()>;
}

impl<F: FileSystem + ?Sized> FileSystem for &mut F {
    fn list(&self, dir: &Path) -> io::Result<DirListing> {
        (**self).list(dir)
    }

    fn move_file(&mut self, source: &Path, destination: &Path) -> io::Result<()> {
        (**self).move_file(source, destination)
    }

    fn copy_file(&mut self, source: &Path, destination: &Path) -> io::Result<()> {
        (**self).copy_file(source, destination)
    }

    fn delete(&mut self, path: &Path) -> io::Result<()> {
        (**self).delete(path)
    }

    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }

    fn mkdir(&mut self, path: &Path) -> io::Result<()> {
        (**self).mkdir(path)
    }

    fn rmdir(&mut self, path: &Path) -> io::Result<()> {
        (**self).rmdir(path)
    }
}

/// Direct wrappers over `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFileSystem;

impl RealFileSystem {
    pub fn new() -> Self {
        Self
    }

    fn read_entry(entry: &fs::DirEntry) -> io::Result<FsEntry> {
        let file_type = entry.file_type()?;
        let kind = if file_type.is_dir() {
            EntryKind::Directory
        } else if file_type.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        };
        // symlink_metadata so a dangling link is still listable
        let metadata = fs::symlink_metadata(entry.path())?;

        Ok(FsEntry {
            path: entry.path(),
            name: entry.file_name().to_string_lossy().into_owned(),
            kind,
            size: metadata.len(),
            modified: metadata.modified()?,
        })
    }
}

impl FileSystem for RealFileSystem {
    fn list(&self, dir: &Path) -> io::Result<DirListing> {
        let mut listing = DirListing::default();
        for entry in fs::read_dir(dir)? {
            match entry {
                Ok(entry) => match Self::read_entry(&entry) {
                    Ok(fs_entry) => listing.entries.push(fs_entry),
                    Err(e) => listing.failures.push((entry.path(), e)),
                },
                Err(e) => listing.failures.push((dir.to_path_buf(), e)),
            }
        }
        Ok(listing)
    }

    fn move_file(&mut self, source: &Path, destination: &Path) -> io::Result<()> {
        // rename silently replaces an existing file on Unix
        if destination.exists() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("destination {} already exists", destination.display()),
            ));
        }
        fs::rename(source, destination)
    }

    fn copy_file(&mut self, source: &Path, destination: &Path) -> io::Result<()> {
        if destination.exists() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("destination {} already exists", destination.display()),
            ));
        }
        fs::copy(source, destination).map(|_| ())
    }

    fn delete(&mut self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn mkdir(&mut self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn rmdir(&mut self, path: &Path) -> io::Result<()> {
        fs::remove_dir(path)
    }
}

/// Simulated backend for dry runs.
///
/// Reads go to disk. Mutations are logged through the sink and never touch
/// disk. Moves and copies are remembered in the virtual state
/// (destination -> source) and count as existing from then on. The state lives
/// as long as this value and is never persisted.
pub struct DryRunFileSystem {
    real: RealFileSystem,
    sink: Arc<dyn EventSink>,
    virtual_state: HashMap<PathBuf, PathBuf>,
}

impl DryRunFileSystem {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            real: RealFileSystem::new(),
            sink,
            virtual_state: HashMap::new(),
        }
    }

    /// Destinations recorded so far, each mapped to the path it came from.
    pub fn virtual_state(&self) -> &HashMap<PathBuf, PathBuf> {
        &self.virtual_state
    }
}

impl FileSystem for DryRunFileSystem {
    fn list(&self, dir: &Path) -> io::Result<DirListing> {
        self.real.list(dir)
    }

    fn move_file(&mut self, source: &Path, destination: &Path) -> io::Result<()> {
        self.sink.info(&format!(
            "[DRY RUN] MOVE: '{}' -> '{}'",
            source.display(),
            destination.display()
        ));
        self.virtual_state
            .insert(destination.to_path_buf(), source.to_path_buf());
        Ok(())
    }

    fn copy_file(&mut self, source: &Path, destination: &Path) -> io::Result<()> {
        self.sink.info(&format!(
            "[DRY RUN] COPY: '{}' -> '{}'",
            source.display(),
            destination.display()
        ));
        self.virtual_state
            .insert(destination.to_path_buf(), source.to_path_buf());
        Ok(())
    }

    fn delete(&mut self, path: &Path) -> io::Result<()> {
        self.sink
            .info(&format!("[DRY RUN] DELETE: '{}'", path.display()));
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.virtual_state.contains_key(path) || self.real.exists(path)
    }

    fn mkdir(&mut self, path: &Path) -> io::Result<()> {
        self.sink
            .info(&format!("[DRY RUN] MKDIR: '{}'", path.display()));
        Ok(())
    }

    fn rmdir(&mut self, path: &Path) -> io::Result<()> {
        self.sink
            .info(&format!("[DRY RUN] RMDIR: '{}'", path.display()));
        Ok(())
    }
}
