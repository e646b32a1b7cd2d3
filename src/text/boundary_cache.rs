//! Persisted chunk boundaries keyed by document.
//!
//! A cache entry records the content hash of the text it was computed from.
//! Entries are only replayed for byte-identical content, so chunk indices
//! stay stable across runs even if the chunk size setting changes.

use super::chunker::Boundary;
use crate::defaults::BOUNDARY_CACHE_SUFFIX;
use crate::error::Result;
use crate::keys::RunKey;
use crate::persist::{read_json, remove_file_best_effort, write_json_atomic};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundarySet {
    pub content_hash: String,
    pub boundaries: Vec<Boundary>,
}

#[derive(Debug, Clone)]
pub struct BoundaryCache {
    dir: PathBuf,
}

impl BoundaryCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &RunKey) -> PathBuf {
        self.dir.join(format!("{key}{BOUNDARY_CACHE_SUFFIX}"))
    }

    /// Load the entry for `key`. Missing or unreadable entries are `None`.
    pub fn load(&self, key: &RunKey) -> Option<BoundarySet> {
        let path = self.path_for(key);
        match read_json::<BoundarySet>(&path) {
            Ok(set) => set,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "ignoring unreadable boundary cache");
                None
            }
        }
    }

    pub fn store(&self, key: &RunKey, set: &BoundarySet) -> Result<()> {
        write_json_atomic(&self.path_for(key), set)
    }

    /// Remove the entry for `key`. Returns true if one existed.
    pub fn remove(&self, key: &RunKey) -> bool {
        remove_file_best_effort(&self.path_for(key))
    }

    /// Remove every cache entry. Returns the number removed.
    pub fn clear_all(&self) -> usize {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return 0;
        };
        entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(BOUNDARY_CACHE_SUFFIX))
            })
            .filter(|p| remove_file_best_effort(p))
            .count()
    }
}
