//! Content hashing for duplicate detection.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Size of each read while streaming a file through the digest.
pub const BLOCK_SIZE: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("failed to hash {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Produces a content digest for one file.
///
/// Implementations are called from worker threads and must not share
/// mutable state between calls.
pub trait ContentHasher: Send + Sync {
    fn hash(&self, path: &Path) -> Result<String, HashError>;
}

/// SHA-256 over the whole file, read in [`BLOCK_SIZE`] chunks.
#[derive(Debug, Default, Clone, Copy)]
pub struct HashService;

impl HashService {
    pub fn new() -> Self {
        Self
    }

    fn digest(path: &Path) -> io::Result<String> {
        let mut file = File::open(path)?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; BLOCK_SIZE];
        loop {
            let n = file.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }
        Ok(format!("{:x}", hasher.finalize()))
    }
}

impl ContentHasher for HashService {
    fn hash(&self, path: &Path) -> Result<String, HashError> {
        Self::digest(path).map_err(|source| HashError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
