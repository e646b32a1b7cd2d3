//! Durable checkpoint records, one JSON file per run.
//!
//! Layout: `<dir>/<run-key>.checkpoint.json`. The run key is derived from the
//! document path alone, so lookups are a single file open and never need a
//! directory scan. Mutating operations are serialized by an in-process lock
//! and written atomically.

use super::record::{CheckpointRecord, RunStatus, unix_now};
use crate::defaults::CHECKPOINT_SUFFIX;
use crate::error::{ChunkvoxError, Result};
use crate::keys::RunKey;
use crate::persist::{read_json, remove_file_best_effort, write_json_atomic};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Whether a purge also deletes the run's audio files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactPolicy {
    Keep,
    Delete,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PurgeReport {
    pub record_removed: bool,
    pub artifacts_removed: usize,
}

#[derive(Debug)]
pub struct CheckpointStore {
    dir: PathBuf,
    prune_completed: bool,
    write_lock: Mutex<()>,
}

impl CheckpointStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| ChunkvoxError::CheckpointStorage {
            message: format!("cannot create {}: {e}", dir.display()),
        })?;
        Ok(Self {
            dir,
            prune_completed: true,
            write_lock: Mutex::new(()),
        })
    }

    /// Keep completed records on disk instead of deleting them.
    pub fn with_prune_completed(mut self, prune: bool) -> Self {
        self.prune_completed = prune;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &RunKey) -> PathBuf {
        self.dir.join(format!("{key}{CHECKPOINT_SUFFIX}"))
    }

    /// Load the record for `key` regardless of status.
    pub fn load(&self, key: &RunKey) -> Result<Option<CheckpointRecord>> {
        let path = self.path_for(key);
        read_json(&path).map_err(|e| match e {
            ChunkvoxError::Json(err) => ChunkvoxError::CheckpointCorrupt {
                path: path.display().to_string(),
                message: err.to_string(),
            },
            other => storage_error(other),
        })
    }

    /// Insert or replace the record stored under `record.run_key`.
    pub fn save_progress(&self, record: &CheckpointRecord) -> Result<()> {
        let _guard = self.lock();
        self.write(record.clone())
    }

    /// The record for `key` unless it is completed.
    pub fn load_incomplete(&self, key: &RunKey) -> Result<Option<CheckpointRecord>> {
        Ok(self.load(key)?.filter(|r| !r.status.is_completed()))
    }

    /// Mark the run completed, deleting the record when pruning is enabled.
    pub fn mark_completed(&self, key: &RunKey) -> Result<()> {
        let _guard = self.lock();
        if self.prune_completed {
            remove_file_best_effort(&self.path_for(key));
            debug!(run = %key, "completed run pruned");
            return Ok(());
        }
        self.modify(key, |r| r.status = RunStatus::Completed)
    }

    pub fn update_status(&self, key: &RunKey, status: RunStatus) -> Result<()> {
        let _guard = self.lock();
        self.modify(key, |r| r.status = status)
    }

    /// Seconds accumulated over earlier sessions; 0 when no record exists.
    pub fn get_cumulative_time(&self, key: &RunKey) -> Result<f64> {
        Ok(self
            .load(key)?
            .map(|r| r.cumulative_time_secs)
            .unwrap_or(0.0))
    }

    pub fn add_cumulative_time(&self, key: &RunKey, delta_secs: f64) -> Result<()> {
        let _guard = self.lock();
        self.modify(key, |r| r.cumulative_time_secs += delta_secs.max(0.0))
    }

    /// Remove the record for `key`.
    ///
    /// Audio artifacts listed in the record are only deleted with
    /// [`ArtifactPolicy::Delete`]. Failures are logged, never returned.
    pub fn purge(&self, key: &RunKey, policy: ArtifactPolicy) -> PurgeReport {
        let _guard = self.lock();
        let mut report = PurgeReport::default();

        if policy == ArtifactPolicy::Delete {
            match self.load(key) {
                Ok(Some(record)) => {
                    report.artifacts_removed = record
                        .artifact_paths()
                        .into_iter()
                        .filter(|p| remove_file_best_effort(p))
                        .count();
                }
                Ok(None) => {}
                Err(e) => warn!(run = %key, error = %e, "cannot read record to delete its audio"),
            }
        }

        report.record_removed = remove_file_best_effort(&self.path_for(key));
        report
    }

    /// Delete the record for `key`. Returns true if one existed.
    pub fn delete(&self, key: &RunKey) -> bool {
        let _guard = self.lock();
        remove_file_best_effort(&self.path_for(key))
    }

    /// All readable records, ordered by most recently updated first.
    ///
    /// Unreadable files are skipped with a warning.
    pub fn list(&self) -> Result<Vec<CheckpointRecord>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(storage_error(e.into())),
        };

        let mut records = Vec::new();
        for path in entries.filter_map(|e| e.ok()).map(|e| e.path()) {
            let Some(key) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_suffix(CHECKPOINT_SUFFIX))
                .and_then(RunKey::parse)
            else {
                continue;
            };
            match self.load(&key) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable checkpoint"),
            }
        }
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(records)
    }

    /// Remove records that are completed or whose document is gone.
    ///
    /// Returns the removed records.
    pub fn cleanup_stale(&self) -> Result<Vec<CheckpointRecord>> {
        let stale: Vec<CheckpointRecord> = self
            .list()?
            .into_iter()
            .filter(|r| r.status.is_completed() || !r.document_path.exists())
            .collect();
        for record in &stale {
            self.delete(&record.run_key);
        }
        Ok(stale)
    }

    /// Remove every record. Returns the number removed.
    pub fn clear_all(&self) -> Result<usize> {
        let records = self.list()?;
        Ok(records.iter().filter(|r| self.delete(&r.run_key)).count())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Read-modify-write of an existing record. Caller holds the lock.
    fn modify(&self, key: &RunKey, change: impl FnOnce(&mut CheckpointRecord)) -> Result<()> {
        let Some(mut record) = self.load(key)? else {
            debug!(run = %key, "no checkpoint to update");
            return Ok(());
        };
        change(&mut record);
        self.write(record)
    }

    fn write(&self, mut record: CheckpointRecord) -> Result<()> {
        if record.completed_chunks > record.total_chunks {
            return Err(ChunkvoxError::CheckpointStorage {
                message: format!(
                    "completed chunks ({}) exceed total ({})",
                    record.completed_chunks, record.total_chunks
                ),
            });
        }
        record.updated_at = unix_now();
        let path = self.path_for(&record.run_key);
        write_json_atomic(&path, &record).map_err(storage_error)?;
        debug!(
            run = %record.run_key,
            status = %record.status,
            completed = record.completed_chunks,
            total = record.total_chunks,
            "checkpoint saved"
        );
        Ok(())
    }
}

fn storage_error(e: ChunkvoxError) -> ChunkvoxError {
    match e {
        ChunkvoxError::CheckpointStorage { .. } | ChunkvoxError::CheckpointCorrupt { .. } => e,
        other => ChunkvoxError::CheckpointStorage {
            message: other.to_string(),
        },
    }
}
