use crate::keys::RunKey;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Lifecycle state of a run as persisted in its checkpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    InProgress,
    /// Finished a pass but some chunks failed and need another run.
    Processing,
    Stopped,
    ForceStopped,
    Completed,
}

impl RunStatus {
    pub fn is_completed(self) -> bool {
        self == Self::Completed
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Processing => "processing",
            Self::Stopped => "stopped",
            Self::ForceStopped => "force_stopped",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speed {
    #[default]
    Normal,
    Slow,
}

impl Speed {
    pub fn from_slow(slow: bool) -> Self {
        if slow { Self::Slow } else { Self::Normal }
    }

    pub fn is_slow(self) -> bool {
        self == Self::Slow
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Normal => "normal",
            Self::Slow => "slow",
        })
    }
}

/// Seconds since the Unix epoch, saturating to 0 on clock skew.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Persisted progress of one run.
///
/// `completed_chunks` always equals the number of entries in `artifacts`,
/// i.e. chunks whose audio file was verified on disk when recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub run_key: RunKey,
    pub document_path: PathBuf,
    pub total_chunks: usize,
    pub completed_chunks: usize,
    #[serde(default)]
    pub failed_chunks: BTreeSet<usize>,
    /// Produced artifact per completed chunk index.
    #[serde(default)]
    pub artifacts: BTreeMap<usize, PathBuf>,
    /// Output directory holding the artifacts.
    pub output_path: PathBuf,
    pub language: String,
    #[serde(default)]
    pub speed: Speed,
    #[serde(default)]
    pub status: RunStatus,
    /// Processing time of all earlier sessions, in seconds.
    #[serde(default)]
    pub cumulative_time_secs: f64,
    #[serde(default)]
    pub session_started_at: u64,
    #[serde(default)]
    pub name_prefix: Option<String>,
    /// Hash of the document text the chunks were cut from. Absent in
    /// records written before it was tracked.
    #[serde(default)]
    pub content_hash: Option<String>,
    #[serde(default)]
    pub updated_at: u64,
}

impl CheckpointRecord {
    pub fn new(
        run_key: RunKey,
        document_path: impl Into<PathBuf>,
        total_chunks: usize,
        output_path: impl Into<PathBuf>,
        language: impl Into<String>,
        speed: Speed,
        name_prefix: Option<String>,
    ) -> Self {
        let now = unix_now();
        Self {
            run_key,
            document_path: document_path.into(),
            total_chunks,
            completed_chunks: 0,
            failed_chunks: BTreeSet::new(),
            artifacts: BTreeMap::new(),
            output_path: output_path.into(),
            language: language.into(),
            speed,
            status: RunStatus::InProgress,
            cumulative_time_secs: 0.0,
            session_started_at: now,
            name_prefix,
            content_hash: None,
            updated_at: now,
        }
    }

    /// Record a chunk whose artifact now exists at `path`.
    pub fn record_completed(&mut self, index: usize, path: PathBuf) {
        self.failed_chunks.remove(&index);
        self.artifacts.insert(index, path);
        self.completed_chunks = self.artifacts.len();
    }

    pub fn record_failed(&mut self, index: usize) {
        self.failed_chunks.insert(index);
    }

    /// Artifact paths ordered by chunk index.
    pub fn artifact_paths(&self) -> Vec<&Path> {
        self.artifacts.values().map(PathBuf::as_path).collect()
    }

    /// Drop artifacts that are no longer on disk.
    ///
    /// Returns the indices that were dropped; they will be synthesized again.
    pub fn reconcile_with_disk(&mut self) -> Vec<usize> {
        let missing: Vec<usize> = self
            .artifacts
            .iter()
            .filter(|(_, path)| !path.is_file())
            .map(|(&index, _)| index)
            .collect();
        for index in &missing {
            self.artifacts.remove(index);
        }
        self.completed_chunks = self.artifacts.len();
        missing
    }

    /// Indices still to synthesize, in order.
    pub fn pending_indices(&self) -> Vec<usize> {
        (0..self.total_chunks)
            .filter(|i| !self.artifacts.contains_key(i))
            .collect()
    }

    pub fn is_done(&self) -> bool {
        self.completed_chunks >= self.total_chunks
    }

    pub fn progress_percent(&self) -> f64 {
        if self.total_chunks == 0 {
            return 100.0;
        }
        self.completed_chunks as f64 * 100.0 / self.total_chunks as f64
    }
}
