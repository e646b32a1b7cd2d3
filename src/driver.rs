//! Orchestrates one document conversion:
//! chunk → resume decision → schedule → finalize checkpoint.

use crate::artifact::ArtifactNamer;
use crate::checkpoint::{
    ArtifactPolicy, CheckpointRecord, CheckpointStore, PurgeReport, RunStatus, Speed, unix_now,
};
use crate::config::Config;
use crate::control::ShutdownController;
use crate::defaults::{AUDIO_EXTENSION, DEFAULT_PREFIX, ETA_WINDOW};
use crate::error::{ChunkvoxError, Result};
use crate::keys::{RunKey, content_hash};
use crate::pipeline::{
    ChunkJob, CheckpointRecorder, Clock, DisplaySink, ProgressTracker, RunSummary, Scheduler,
    SchedulerConfig, SystemClock,
};
use crate::synth::Synthesizer;
use crate::sys;
use crate::text::{BoundaryCache, Chunker, read_document};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// What to convert and how. Output settings are ignored when an incomplete
/// run is resumed; the saved ones are reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub document: PathBuf,
    pub output_dir: PathBuf,
    pub prefix: Option<String>,
    pub language: String,
    pub speed: Speed,
    pub max_chars: usize,
    /// Continue an incomplete run if one exists.
    pub resume: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// Some chunks failed; rerun to retry them.
    Incomplete,
    Stopped,
    ForceStopped,
    /// Stopped and all progress deleted.
    Deleted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionReport {
    pub outcome: RunOutcome,
    pub run_key: RunKey,
    pub output_dir: PathBuf,
    pub total_chunks: usize,
    pub completed_chunks: usize,
    /// Chunks already done when this session started.
    pub resumed_from: Option<usize>,
    pub failed_chunks: Vec<usize>,
    pub artifacts: Vec<PathBuf>,
    pub session_elapsed: Duration,
    pub total_elapsed: Duration,
}

pub struct Driver<C: Clock + Clone = SystemClock> {
    store: CheckpointStore,
    chunker: Chunker,
    synthesizer: Box<dyn Synthesizer>,
    controller: ShutdownController,
    scheduler: SchedulerConfig,
    clock: C,
    eta_window: usize,
    fallback_prefix: String,
    extension: String,
}

impl Driver<SystemClock> {
    pub fn new(
        store: CheckpointStore,
        chunker: Chunker,
        synthesizer: Box<dyn Synthesizer>,
        controller: ShutdownController,
        scheduler: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            chunker,
            synthesizer,
            controller,
            scheduler,
            clock: SystemClock,
            eta_window: ETA_WINDOW,
            fallback_prefix: DEFAULT_PREFIX.to_string(),
            extension: AUDIO_EXTENSION.to_string(),
        }
    }

    /// Wire a driver from configuration: state dir, boundary cache and
    /// scheduler settings.
    pub fn from_config(
        config: &Config,
        synthesizer: Box<dyn Synthesizer>,
        controller: ShutdownController,
    ) -> Result<Self> {
        let state_dir = config.state.resolve_directory();
        let store = CheckpointStore::open(state_dir.join("checkpoints"))?
            .with_prune_completed(config.state.prune_completed);
        let chunker = Chunker::with_cache(BoundaryCache::new(state_dir.join("boundaries")));
        let driver = Self::new(
            store,
            chunker,
            synthesizer,
            controller,
            SchedulerConfig::from_config(config),
        )
        .with_eta_window(config.display.eta_window)
        .with_artifact_naming(&config.output.default_prefix, &config.output.extension);
        Ok(driver)
    }
}

impl<C: Clock + Clone> Driver<C> {
    pub fn with_clock<D: Clock + Clone>(self, clock: D) -> Driver<D> {
        Driver {
            store: self.store,
            chunker: self.chunker,
            synthesizer: self.synthesizer,
            controller: self.controller,
            scheduler: self.scheduler,
            clock,
            eta_window: self.eta_window,
            fallback_prefix: self.fallback_prefix,
            extension: self.extension,
        }
    }

    pub fn with_eta_window(mut self, window: usize) -> Self {
        self.eta_window = window.max(1);
        self
    }

    pub fn with_artifact_naming(mut self, fallback_prefix: &str, extension: &str) -> Self {
        self.fallback_prefix = fallback_prefix.to_string();
        self.extension = extension.to_string();
        self
    }

    /// Process chunks one at a time, in order.
    pub fn sequential(mut self) -> Self {
        self.scheduler = self.scheduler.sequential();
        self
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    pub fn chunker(&self) -> &Chunker {
        &self.chunker
    }

    pub fn controller(&self) -> &ShutdownController {
        &self.controller
    }

    /// Incomplete run for `document`, if any. A corrupt record is deleted
    /// and reported as absent.
    pub fn pending_run(&self, document: &Path) -> Result<Option<CheckpointRecord>> {
        let key = RunKey::for_document(document);
        match self.store.load_incomplete(&key) {
            Ok(record) => Ok(record),
            Err(ChunkvoxError::CheckpointCorrupt { path, message }) => {
                warn!(%path, %message, "discarding unreadable checkpoint");
                self.store.delete(&key);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Namer for the artifacts of `record`, using this driver's fallback
    /// prefix and extension.
    pub fn artifact_namer(&self, record: &CheckpointRecord) -> ArtifactNamer {
        ArtifactNamer::new(record.output_path.clone(), record.name_prefix.clone())
            .with_fallback_prefix(self.fallback_prefix.clone())
            .with_extension(self.extension.clone())
    }

    /// Delete saved progress and the boundary cache for `document`.
    pub fn delete_progress(&self, document: &Path, policy: ArtifactPolicy) -> PurgeReport {
        let key = RunKey::for_document(document);
        let report = self.store.purge(&key, policy);
        if let Some(cache) = self.chunker.cache() {
            cache.remove(&key);
        }
        report
    }

    /// Convert `request.document`, blocking until done or stopped.
    pub fn convert(
        &self,
        request: &ConversionRequest,
        display: &mut dyn DisplaySink,
    ) -> Result<ConversionReport> {
        let text = read_document(&request.document)?;
        if text.trim().is_empty() {
            return Err(ChunkvoxError::EmptyDocument {
                path: request.document.display().to_string(),
            });
        }

        let key = RunKey::for_document(&request.document);
        let chunks = self.chunker.split(&text, request.max_chars, Some(&key));
        info!(chunks = chunks.len(), document = %request.document.display(), "document chunked");

        let existing = if request.resume {
            self.pending_run(&request.document)?
        } else {
            None
        };
        let hash = content_hash(&text);
        let existing = existing.filter(|record| {
            if record.total_chunks != chunks.len() {
                info!(
                    saved = record.total_chunks,
                    current = chunks.len(),
                    "chunk count changed, starting over"
                );
                self.store.delete(&key);
                return false;
            }
            if record.content_hash.as_ref().is_some_and(|saved| *saved != hash) {
                info!("document edited since the last run, starting over");
                self.store.delete(&key);
                return false;
            }
            true
        });

        let resumed_from = existing.as_ref().map(|r| r.completed_chunks);
        let mut record = match existing {
            Some(mut record) => {
                let missing = record.reconcile_with_disk();
                if !missing.is_empty() {
                    warn!(count = missing.len(), "previously completed audio files are missing, redoing them");
                }
                record.session_started_at = unix_now();
                record
            }
            None => CheckpointRecord::new(
                key.clone(),
                crate::keys::normalize_document_path(&request.document),
                chunks.len(),
                request.output_dir.clone(),
                request.language.clone(),
                request.speed,
                request.prefix.clone(),
            ),
        };
        record.content_hash = Some(hash);
        record.failed_chunks.clear();

        prepare_output_dir(&record.output_path)?;

        let namer = self.artifact_namer(&record);
        let jobs: Vec<ChunkJob> = record
            .pending_indices()
            .into_iter()
            .map(|index| ChunkJob {
                index,
                text: chunks[index].clone(),
                destination: namer.path_for(index),
                language: record.language.clone(),
                speed: record.speed,
                total_chunks: chunks.len(),
            })
            .collect();
        debug!(pending = jobs.len(), "jobs queued");

        let mut tracker = ProgressTracker::new(
            self.clock.clone(),
            record.total_chunks,
            record.completed_chunks,
            saved_duration(record.cumulative_time_secs),
            self.eta_window,
        );

        self.controller.start_processing();
        let scheduler = Scheduler::new(
            self.scheduler.clone(),
            self.synthesizer.as_ref(),
            self.controller.clone(),
            self.clock.clone(),
        );
        let mut recorder = CheckpointRecorder::new(&self.store, record);
        let run = scheduler.run(jobs, &mut tracker, &mut recorder, display);
        let record = recorder.into_record();
        let summary = match run {
            Ok(summary) => summary,
            Err(e) => {
                self.controller.finish();
                return Err(e);
            }
        };

        let outcome = self.finalize(&key, &record, &summary, &mut tracker)?;
        self.controller.finish();

        Ok(ConversionReport {
            outcome,
            run_key: key,
            output_dir: record.output_path.clone(),
            total_chunks: record.total_chunks,
            completed_chunks: record.completed_chunks,
            resumed_from,
            failed_chunks: record.failed_chunks.iter().copied().collect(),
            artifacts: record
                .artifact_paths()
                .into_iter()
                .map(Path::to_path_buf)
                .collect(),
            session_elapsed: tracker.session_elapsed(),
            total_elapsed: tracker.total_elapsed(),
        })
    }

    fn finalize(
        &self,
        key: &RunKey,
        record: &CheckpointRecord,
        summary: &RunSummary,
        tracker: &mut ProgressTracker<C>,
    ) -> Result<RunOutcome> {
        if self.controller.should_delete_progress() {
            let report = self.store.purge(key, ArtifactPolicy::Keep);
            if let Some(cache) = self.chunker.cache() {
                cache.remove(key);
            }
            info!(removed = report.record_removed, "progress deleted on request");
            return Ok(RunOutcome::Deleted);
        }

        if summary.stopped && !record.is_done() {
            let (status, outcome) = if summary.force_stopped {
                (RunStatus::ForceStopped, RunOutcome::ForceStopped)
            } else {
                (RunStatus::Stopped, RunOutcome::Stopped)
            };
            self.store.update_status(key, status)?;
            tracker.commit(&self.store, key)?;
            return Ok(outcome);
        }

        if !record.is_done() {
            let mut pending = record.clone();
            pending.status = RunStatus::Processing;
            self.store.save_progress(&pending)?;
            tracker.commit(&self.store, key)?;
            return Ok(RunOutcome::Incomplete);
        }

        if self.store.load(key)?.is_none() {
            // Nothing was synthesized this session (already complete); keep
            // a record so the time commit and completion have a target.
            self.store.save_progress(record)?;
        }
        tracker.commit(&self.store, key)?;
        self.store.mark_completed(key)?;
        if let Some(cache) = self.chunker.cache() {
            cache.remove(key);
        }
        Ok(RunOutcome::Completed)
    }
}

/// Cumulative time from a checkpoint. Negative, NaN or out-of-range values
/// count as zero.
fn saved_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
}

/// Create the output directory and check it accepts new files.
pub fn prepare_output_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| ChunkvoxError::OutputDirCreate {
        path: dir.display().to_string(),
        message: e.to_string(),
    })?;
    if !sys::is_writable_dir(dir) {
        return Err(ChunkvoxError::OutputDirNotWritable {
            path: dir.display().to_string(),
        });
    }
    Ok(())
}
