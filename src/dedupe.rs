//! Duplicate detection.
//!
//! 1. **Size buckets**: files are grouped by exact size. Buckets with a single
//!    member, and the zero-size bucket, are dropped without reading any data.
//! 2. **Hashing**: every surviving file is hashed on a rayon pool (or on the
//!    calling thread in serial mode). A file that fails to hash is left out.
//! 3. **Hash groups**: files are grouped by digest and groups of one are dropped.
//!
//! Members of a group keep their traversal order in both modes, so serial and
//! parallel runs return identical results.

use crate::entities::{ActionRecord, DuplicateGroups, FileRecord};
use crate::hashing::{ContentHasher, HashError, HashService};
use crate::logging::{EventSink, NullSink};
use std::collections::HashMap;
use std::sync::Arc;

/// Finds groups of files with identical content.
pub struct DuplicateFinder {
    hasher: Arc<dyn ContentHasher>,
    parallel: bool,
    workers: usize,
    sink: Arc<dyn EventSink>,
}

impl Default for DuplicateFinder {
    fn default() -> Self {
        Self::new(Arc::new(HashService::new()))
    }
}

impl DuplicateFinder {
    /// Parallel finder sized to the host.
    pub fn new(hasher: Arc<dyn ContentHasher>) -> Self {
        Self {
            hasher,
            parallel: true,
            workers: 0,
            sink: Arc::new(NullSink),
        }
    }

    /// Finder that hashes on the calling thread.
    pub fn serial(hasher: Arc<dyn ContentHasher>) -> Self {
        Self {
            parallel: false,
            ..Self::new(hasher)
        }
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Pool size; 0 uses the host's available parallelism.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn find_duplicates<I>(&self, files: I) -> DuplicateGroups
    where
        I: IntoIterator<Item = FileRecord>,
    {
        let candidates = Self::size_candidates(files);
        if candidates.is_empty() {
            self.sink.debug("No size collisions, nothing to hash");
            return DuplicateGroups::new();
        }

        self.sink.info(&format!(
            "Hashing {} candidate files{}",
            candidates.len(),
            if self.parallel { " in parallel" } else { "" }
        ));

        let hashed = self.hash_all(candidates);

        let mut groups = DuplicateGroups::new();
        for (record, result) in hashed {
            match result {
                Ok(digest) => groups
                    .entry(digest.clone())
                    .or_default()
                    .push(record.with_hash(digest)),
                Err(e) => self.sink.warn(&format!("Skipping file: {}", e)),
            }
        }
        groups.retain(|_, members| members.len() > 1);

        self.sink
            .info(&format!("Found {} duplicate groups", groups.len()));
        groups
    }

    /// Stage 1: keeps only records that share a non-zero size with another
    /// record, in their original order.
    fn size_candidates<I>(files: I) -> Vec<FileRecord>
    where
        I: IntoIterator<Item = FileRecord>,
    {
        let records: Vec<FileRecord> = files.into_iter().collect();
        let mut size_counts: HashMap<u64, usize> = HashMap::new();
        for record in &records {
            *size_counts.entry(record.size).or_insert(0) += 1;
        }

        records
            .into_iter()
            .filter(|r| r.size > 0 && size_counts.get(&r.size).copied().unwrap_or(0) > 1)
            .collect()
    }

    /// Stage 2: hashes every candidate, preserving input order.
    fn hash_all(&self, candidates: Vec<FileRecord>) -> Vec<(FileRecord, Result<String, HashError>)> {
        let hash_one = |record: FileRecord| {
            let result = self.hasher.hash(&record.path);
            (record, result)
        };

        if !self.parallel {
            return candidates.into_iter().map(hash_one).collect();
        }

        let threads = if self.workers == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            self.workers
        };

        match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => {
                use rayon::prelude::*;
                pool.install(|| candidates.into_par_iter().map(hash_one).collect::<Vec<_>>())
            }
            Err(e) => {
                self.sink.warn(&format!(
                    "Failed to build hashing pool ({}), hashing serially",
                    e
                ));
                candidates.into_iter().map(hash_one).collect()
            }
        }
    }
}

/// Plans the deletion of every duplicate except the first member of each
/// group, which is kept.
pub fn plan_duplicate_removal(groups: &DuplicateGroups) -> Vec<ActionRecord> {
    groups
        .values()
        .filter_map(|members| members.split_first())
        .flat_map(|(keeper, rest)| {
            rest.iter().map(move |duplicate| {
                ActionRecord::delete_file(
                    &duplicate.path,
                    format!("Duplicate of {}", keeper.path.display()),
                )
            })
        })
        .collect()
}

/// Bytes that removing all but one member of each group would free.
pub fn reclaimable_bytes(groups: &DuplicateGroups) -> u64 {
    groups
        .values()
        .map(|members| members.iter().skip(1).map(|r| r.size).sum::<u64>())
        .sum()
}
