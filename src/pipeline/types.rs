//! Data flowing between the scheduler, its workers and the aggregator.

use crate::checkpoint::Speed;
use std::path::PathBuf;
use std::time::Duration;

/// One chunk waiting to be synthesized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkJob {
    /// 0-based chunk index in the document.
    pub index: usize,
    pub text: String,
    /// Artifact path, derived from the output directory and name prefix.
    pub destination: PathBuf,
    pub language: String,
    pub speed: Speed,
    pub total_chunks: usize,
}

impl ChunkJob {
    /// 1-based number shown to users.
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    Completed { artifact: PathBuf },
    /// Retries exhausted; redone on the next run.
    Failed { error: String },
    /// Abandoned by a force stop; any partial artifact was deleted.
    Discarded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkResult {
    pub index: usize,
    pub outcome: ChunkOutcome,
    pub duration: Duration,
    pub attempts: u32,
}

impl ChunkResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ChunkOutcome::Completed { .. })
    }
}

/// Final tally of one scheduler run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: Vec<usize>,
    pub failed: Vec<usize>,
    pub discarded: Vec<usize>,
    /// Jobs never dequeued because of a stop.
    pub not_started: usize,
    pub stopped: bool,
    pub force_stopped: bool,
}

impl RunSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty() && self.discarded.is_empty() && self.not_started == 0 && !self.stopped
    }
}
