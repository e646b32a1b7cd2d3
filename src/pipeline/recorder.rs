//! Persists chunk results into the run's checkpoint record.

use super::scheduler::ResultHandler;
use super::types::{ChunkOutcome, ChunkResult};
use crate::checkpoint::{CheckpointRecord, CheckpointStore, RunStatus};
use crate::error::Result;
use tracing::warn;

/// Writes the checkpoint after every completed or failed chunk.
///
/// A completion is only counted if its artifact is on disk at record time,
/// which keeps `completed_chunks` equal to the number of verified files.
/// Discarded chunks are not written at all.
pub struct CheckpointRecorder<'a> {
    store: &'a CheckpointStore,
    record: CheckpointRecord,
}

impl<'a> CheckpointRecorder<'a> {
    pub fn new(store: &'a CheckpointStore, record: CheckpointRecord) -> Self {
        Self { store, record }
    }

    pub fn record(&self) -> &CheckpointRecord {
        &self.record
    }

    pub fn into_record(self) -> CheckpointRecord {
        self.record
    }
}

impl ResultHandler for CheckpointRecorder<'_> {
    fn on_result(&mut self, result: &ChunkResult) -> Result<()> {
        match &result.outcome {
            ChunkOutcome::Completed { artifact } => {
                if artifact.is_file() {
                    self.record.record_completed(result.index, artifact.clone());
                } else {
                    warn!(
                        chunk = result.index + 1,
                        path = %artifact.display(),
                        "artifact missing after synthesis, marking chunk failed"
                    );
                    self.record.record_failed(result.index);
                }
            }
            ChunkOutcome::Failed { .. } => self.record.record_failed(result.index),
            ChunkOutcome::Discarded => return Ok(()),
        }
        self.record.status = RunStatus::InProgress;
        self.store.save_progress(&self.record)
    }
}
