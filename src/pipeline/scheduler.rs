//! Bounded worker pool for chunk synthesis.
//!
//! Thread roles inside one [`Scheduler::run`]:
//! - N workers pull jobs from a preloaded queue and call the synthesizer
//!   with retry/backoff.
//! - One aggregator receives [`ChunkResult`]s, hands them to the
//!   [`ResultHandler`] (checkpointing), updates the tracker and redraws.
//! - The calling thread waits until every job is accounted for, or a stop
//!   was requested and no chunk is active.
//!
//! Active/completed/failed bookkeeping lives behind one coarse mutex;
//! updates happen once per chunk so contention is negligible.

use super::clock::Clock;
use super::display::{DisplaySink, render_lines};
use super::progress::ProgressTracker;
use super::types::{ChunkJob, ChunkOutcome, ChunkResult, RunSummary};
use crate::config::Config;
use crate::control::{CancelToken, ShutdownController, StopKind};
use crate::defaults::{DISPLAY_COMPLETED_LINES, RESULT_POLL_INTERVAL};
use crate::error::{ChunkvoxError, Result};
use crate::persist::remove_file_best_effort;
use crate::synth::{RetryPolicy, SynthesisRequest, Synthesizer};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Receives every chunk result on the aggregator thread.
pub trait ResultHandler: Send {
    /// An error here is fatal: the run stops and the error is returned from
    /// [`Scheduler::run`].
    fn on_result(&mut self, result: &ChunkResult) -> Result<()>;
}

/// Explicit scheduler settings, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub workers: usize,
    pub retry: RetryPolicy,
    /// Result-queue poll and stop-check interval.
    pub poll_interval: Duration,
    /// Redraw interval when no results arrive.
    pub refresh_interval: Duration,
    /// Completed-chunk lines kept in the live display.
    pub display_completed: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: crate::defaults::MAX_PARALLEL_CHUNKS,
            retry: RetryPolicy::default(),
            poll_interval: RESULT_POLL_INTERVAL,
            refresh_interval: crate::defaults::DISPLAY_REFRESH,
            display_completed: DISPLAY_COMPLETED_LINES,
        }
    }
}

impl SchedulerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            workers: config.workers.effective_workers(),
            retry: RetryPolicy::from_config(&config.synthesis),
            poll_interval: RESULT_POLL_INTERVAL,
            refresh_interval: Duration::from_millis(config.display.refresh_ms.max(1)),
            display_completed: DISPLAY_COMPLETED_LINES,
        }
    }

    /// One worker: chunks complete strictly in index order.
    pub fn sequential(mut self) -> Self {
        self.workers = 1;
        self
    }
}

#[derive(Default)]
struct SharedState {
    active: BTreeMap<usize, Instant>,
    completed: BTreeSet<usize>,
    failed: BTreeSet<usize>,
    discarded: BTreeSet<usize>,
    recent_completed: VecDeque<usize>,
}

impl SharedState {
    fn accounted(&self) -> usize {
        self.completed.len() + self.failed.len() + self.discarded.len()
    }
}

pub struct Scheduler<'a, C: Clock> {
    config: SchedulerConfig,
    synthesizer: &'a dyn Synthesizer,
    controller: ShutdownController,
    clock: C,
}

impl<'a, C: Clock> Scheduler<'a, C> {
    pub fn new(
        config: SchedulerConfig,
        synthesizer: &'a dyn Synthesizer,
        controller: ShutdownController,
        clock: C,
    ) -> Self {
        Self {
            config,
            synthesizer,
            controller,
            clock,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Process `jobs` until all are accounted for or a stop drains the pool.
    pub fn run(
        &self,
        jobs: Vec<ChunkJob>,
        tracker: &mut ProgressTracker<C>,
        handler: &mut dyn ResultHandler,
        display: &mut dyn DisplaySink,
    ) -> Result<RunSummary> {
        let total_jobs = jobs.len();
        let (job_tx, job_rx) = unbounded::<ChunkJob>();
        for job in jobs {
            // Receiver is alive in this scope; send on an unbounded channel
            // cannot fail.
            job_tx.send(job).ok();
        }
        drop(job_tx);

        let shared = Mutex::new(SharedState::default());
        let worker_count = self.config.workers.max(1).min(total_jobs.max(1));
        let (result_tx, result_rx) = unbounded::<ChunkResult>();
        let cancel = self.controller.cancel_token();

        info!(jobs = total_jobs, workers = worker_count, "starting synthesis");

        let aggregate = thread::scope(|scope| {
            let mut workers = Vec::with_capacity(worker_count);
            if total_jobs > 0 {
                for id in 0..worker_count {
                    let job_rx = job_rx.clone();
                    let result_tx = result_tx.clone();
                    let shared = &shared;
                    let cancel = &cancel;
                    workers.push(scope.spawn(move || {
                        self.worker_loop(id, &job_rx, &result_tx, shared, cancel);
                    }));
                }
            }
            drop(result_tx);

            let shared_ref = &shared;
            let aggregator =
                scope.spawn(move || self.aggregate(result_rx, shared_ref, tracker, handler, display));

            self.wait_until_drained(&shared, total_jobs);

            for worker in workers {
                if worker.join().is_err() {
                    error!("synthesis worker panicked");
                }
            }
            aggregator.join().unwrap_or_else(|_| {
                Err(ChunkvoxError::Other("result aggregator panicked".to_string()))
            })
        });

        let state = lock(&shared);
        let summary = RunSummary {
            completed: state.completed.iter().copied().collect(),
            failed: state.failed.iter().copied().collect(),
            discarded: state.discarded.iter().copied().collect(),
            not_started: total_jobs.saturating_sub(state.accounted()),
            stopped: !self.controller.should_continue(),
            force_stopped: self.controller.is_force_stop(),
        };
        drop(state);

        aggregate?;
        debug!(?summary, "synthesis finished");
        Ok(summary)
    }

    fn wait_until_drained(&self, shared: &Mutex<SharedState>, total_jobs: usize) {
        loop {
            {
                let state = lock(shared);
                if state.accounted() >= total_jobs {
                    return;
                }
                if !self.controller.should_continue() && state.active.is_empty() {
                    return;
                }
            }
            thread::sleep(self.config.poll_interval);
        }
    }

    fn worker_loop(
        &self,
        id: usize,
        job_rx: &Receiver<ChunkJob>,
        result_tx: &Sender<ChunkResult>,
        shared: &Mutex<SharedState>,
        cancel: &CancelToken,
    ) {
        loop {
            self.controller.handle_pause();

            let job = {
                let mut state = lock(shared);
                if !self.controller.should_continue() {
                    break;
                }
                let Ok(job) = job_rx.try_recv() else {
                    break;
                };
                state.active.insert(job.index, self.clock.now());
                job
            };

            debug!(worker = id, chunk = job.number(), "chunk started");
            let result = self.process(&job, cancel);

            {
                let mut state = lock(shared);
                state.active.remove(&job.index);
                match &result.outcome {
                    ChunkOutcome::Completed { .. } => {
                        state.completed.insert(job.index);
                        state.recent_completed.push_back(job.index);
                        while state.recent_completed.len() > self.config.display_completed {
                            state.recent_completed.pop_front();
                        }
                    }
                    ChunkOutcome::Failed { .. } => {
                        state.failed.insert(job.index);
                    }
                    ChunkOutcome::Discarded => {
                        state.discarded.insert(job.index);
                    }
                }
            }

            if result_tx.send(result).is_err() {
                break;
            }
        }
        debug!(worker = id, "worker exiting");
    }

    /// Synthesize one job with retries, applying force-stop discard rules.
    fn process(&self, job: &ChunkJob, cancel: &CancelToken) -> ChunkResult {
        let started = self.clock.now();
        let request = SynthesisRequest {
            index: job.index,
            text: &job.text,
            language: &job.language,
            speed: job.speed,
        };

        let mut attempts = 0;
        let result = self.config.retry.run(cancel, |attempt| {
            attempts = attempt + 1;
            self.synthesizer
                .synthesize(&request, &job.destination, cancel)
        });

        let outcome = match result {
            Ok(()) if self.controller.is_force_stop() => {
                remove_file_best_effort(&job.destination);
                debug!(chunk = job.number(), "discarding chunk finished during force stop");
                ChunkOutcome::Discarded
            }
            Ok(()) => ChunkOutcome::Completed {
                artifact: job.destination.clone(),
            },
            Err(ChunkvoxError::SynthesisCancelled) => {
                remove_file_best_effort(&job.destination);
                ChunkOutcome::Discarded
            }
            Err(e) => {
                warn!(chunk = job.number(), attempts, error = %e, "chunk failed");
                ChunkOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        ChunkResult {
            index: job.index,
            outcome,
            duration: self.clock.now().saturating_duration_since(started),
            attempts,
        }
    }

    fn aggregate(
        &self,
        result_rx: Receiver<ChunkResult>,
        shared: &Mutex<SharedState>,
        tracker: &mut ProgressTracker<C>,
        handler: &mut dyn ResultHandler,
        display: &mut dyn DisplaySink,
    ) -> Result<()> {
        let mut fatal: Option<ChunkvoxError> = None;
        let mut last_render: Option<Instant> = None;

        loop {
            let mut changed = false;
            match result_rx.recv_timeout(self.config.poll_interval) {
                Ok(result) => {
                    changed = true;
                    match result.outcome {
                        ChunkOutcome::Completed { .. } => tracker.record_completion(),
                        ChunkOutcome::Failed { .. } => tracker.record_failure(),
                        ChunkOutcome::Discarded => {}
                    }
                    if fatal.is_none()
                        && let Err(e) = handler.on_result(&result)
                    {
                        error!(error = %e, "cannot record chunk result, stopping");
                        self.controller.request_stop(StopKind::Graceful);
                        fatal = Some(e);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            let due = last_render
                .is_none_or(|at| at.elapsed() >= self.config.refresh_interval);
            if changed || due {
                self.render(shared, tracker, display);
                last_render = Some(Instant::now());
            }
        }

        self.render(shared, tracker, display);
        display.finish();
        fatal.map_or(Ok(()), Err)
    }

    fn render(
        &self,
        shared: &Mutex<SharedState>,
        tracker: &ProgressTracker<C>,
        display: &mut dyn DisplaySink,
    ) {
        let now = self.clock.now();
        let (recent, active): (Vec<usize>, Vec<(usize, Duration)>) = {
            let state = lock(shared);
            (
                state.recent_completed.iter().copied().collect(),
                state
                    .active
                    .iter()
                    .map(|(&index, &since)| (index, now.saturating_duration_since(since)))
                    .collect(),
            )
        };
        display.render(&render_lines(&tracker.snapshot(), &recent, &active));
    }
}

fn lock(shared: &Mutex<SharedState>) -> MutexGuard<'_, SharedState> {
    shared.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::Speed;
    use crate::control::UserCommand;
    use crate::pipeline::clock::SystemClock;
    use crate::pipeline::display::CollectorDisplay;
    use crate::synth::MockSynthesizer;
    use std::path::Path;

    #[derive(Default)]
    struct Recorded(Vec<ChunkResult>);

    impl ResultHandler for Recorded {
        fn on_result(&mut self, result: &ChunkResult) -> Result<()> {
            self.0.push(result.clone());
            Ok(())
        }
    }

    struct Failing;

    impl ResultHandler for Failing {
        fn on_result(&mut self, _result: &ChunkResult) -> Result<()> {
            Err(ChunkvoxError::CheckpointStorage {
                message: "disk full".to_string(),
            })
        }
    }

    fn jobs(dir: &Path, count: usize) -> Vec<ChunkJob> {
        (0..count)
            .map(|index| ChunkJob {
                index,
                text: format!("chunk text {index}"),
                destination: dir.join(format!("chunk_{}.mp3", index + 1)),
                language: "en".to_string(),
                speed: Speed::Normal,
                total_chunks: count,
            })
            .collect()
    }

    fn config(workers: usize) -> SchedulerConfig {
        SchedulerConfig {
            workers,
            retry: RetryPolicy::new(3, Duration::from_millis(1)),
            poll_interval: Duration::from_millis(5),
            refresh_interval: Duration::from_millis(20),
            display_completed: 4,
        }
    }

    fn tracker(total: usize) -> ProgressTracker<SystemClock> {
        ProgressTracker::new(SystemClock, total, 0, Duration::ZERO, 5)
    }

    fn started() -> ShutdownController {
        let c = ShutdownController::new();
        c.start_processing();
        c
    }

    #[test]
    fn processes_all_jobs_in_parallel() {
        let dir = tempfile::tempdir().unwrap();
        let synth = MockSynthesizer::new();
        let scheduler = Scheduler::new(config(4), &synth, started(), SystemClock);
        let mut handler = Recorded::default();
        let mut display = CollectorDisplay::new();

        let summary = scheduler
            .run(jobs(dir.path(), 6), &mut tracker(6), &mut handler, &mut display)
            .unwrap();

        assert_eq!(summary.completed, vec![0, 1, 2, 3, 4, 5]);
        assert!(summary.all_succeeded());
        assert_eq!(synth.call_count(), 6);
        assert_eq!(handler.0.len(), 6);
        assert!(handler.0.iter().all(ChunkResult::is_success));
        assert!(display.is_finished());
        let last = display.last_frame().unwrap();
        assert!(last.last().unwrap().starts_with("Progress: 6/6"));
    }

    #[test]
    fn empty_job_list_returns_immediately() {
        let synth = MockSynthesizer::new();
        let scheduler = Scheduler::new(config(4), &synth, started(), SystemClock);
        let summary = scheduler
            .run(
                Vec::new(),
                &mut tracker(0),
                &mut Recorded::default(),
                &mut CollectorDisplay::new(),
            )
            .unwrap();
        assert!(summary.completed.is_empty());
        assert_eq!(synth.call_count(), 0);
    }

    #[test]
    fn failing_chunk_does_not_abort_batch() {
        let dir = tempfile::tempdir().unwrap();
        let synth = MockSynthesizer::new().failing_on(1);
        let scheduler = Scheduler::new(config(2), &synth, started(), SystemClock);
        let mut handler = Recorded::default();

        let summary = scheduler
            .run(
                jobs(dir.path(), 4),
                &mut tracker(4),
                &mut handler,
                &mut CollectorDisplay::new(),
            )
            .unwrap();

        assert_eq!(summary.completed, vec![0, 2, 3]);
        assert_eq!(summary.failed, vec![1]);
        assert_eq!(synth.calls_for(1), 3);
        let failed = handler.0.iter().find(|r| r.index == 1).unwrap();
        assert_eq!(failed.attempts, 3);
    }

    #[test]
    fn graceful_stop_finishes_in_flight_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let controller = started();
        let trigger = controller.clone();
        let synth = MockSynthesizer::new().on_synthesize(move |index| {
            if index == 1 {
                trigger.apply(UserCommand::Stop);
            }
        });
        let scheduler = Scheduler::new(config(1).sequential(), &synth, controller, SystemClock);

        let summary = scheduler
            .run(
                jobs(dir.path(), 5),
                &mut tracker(5),
                &mut Recorded::default(),
                &mut CollectorDisplay::new(),
            )
            .unwrap();

        assert_eq!(summary.completed, vec![0, 1]);
        assert_eq!(summary.not_started, 3);
        assert!(summary.stopped);
        assert!(!summary.force_stopped);
        assert!(dir.path().join("chunk_2.mp3").exists());
    }

    #[test]
    fn force_stop_discards_in_flight_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let controller = started();
        let trigger = controller.clone();
        let synth = MockSynthesizer::new().on_synthesize(move |index| {
            if index == 2 {
                trigger.apply(UserCommand::ForceStop);
            }
        });
        let scheduler = Scheduler::new(config(1), &synth, controller, SystemClock);
        let mut handler = Recorded::default();

        let summary = scheduler
            .run(
                jobs(dir.path(), 5),
                &mut tracker(5),
                &mut handler,
                &mut CollectorDisplay::new(),
            )
            .unwrap();

        assert_eq!(summary.completed, vec![0, 1]);
        assert_eq!(summary.discarded, vec![2]);
        assert!(summary.force_stopped);
        assert!(!dir.path().join("chunk_3.mp3").exists());
        assert!(handler.0.iter().any(|r| r.outcome == ChunkOutcome::Discarded));
    }

    #[test]
    fn interrupt_cancels_slow_synthesis() {
        let dir = tempfile::tempdir().unwrap();
        let controller = started();
        let synth = MockSynthesizer::new().with_delay(Duration::from_secs(60));
        let scheduler = Scheduler::new(config(2), &synth, controller.clone(), SystemClock);

        let interrupter = controller.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            interrupter.interrupt();
        });

        let start = Instant::now();
        let summary = scheduler
            .run(
                jobs(dir.path(), 4),
                &mut tracker(4),
                &mut Recorded::default(),
                &mut CollectorDisplay::new(),
            )
            .unwrap();
        handle.join().unwrap();

        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(summary.completed.is_empty());
        assert_eq!(summary.discarded.len(), 2);
        assert_eq!(summary.not_started, 2);
    }

    #[test]
    fn pause_holds_workers_until_resume() {
        let dir = tempfile::tempdir().unwrap();
        let controller = started();
        controller.pause();
        let synth = MockSynthesizer::new();
        let scheduler = Scheduler::new(config(2), &synth, controller.clone(), SystemClock);

        let resumer = controller.clone();
        let probe = synth.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            let calls_while_paused = probe.call_count();
            resumer.resume();
            calls_while_paused
        });

        let summary = scheduler
            .run(
                jobs(dir.path(), 3),
                &mut tracker(3),
                &mut Recorded::default(),
                &mut CollectorDisplay::new(),
            )
            .unwrap();

        assert_eq!(handle.join().unwrap(), 0);
        assert_eq!(summary.completed.len(), 3);
    }

    #[test]
    fn handler_error_stops_run() {
        let dir = tempfile::tempdir().unwrap();
        let synth = MockSynthesizer::new().with_delay(Duration::from_millis(50));
        let controller = started();
        let scheduler = Scheduler::new(config(1), &synth, controller.clone(), SystemClock);

        let err = scheduler
            .run(
                jobs(dir.path(), 5),
                &mut tracker(5),
                &mut Failing,
                &mut CollectorDisplay::new(),
            )
            .unwrap_err();

        assert!(matches!(err, ChunkvoxError::CheckpointStorage { .. }));
        assert!(!controller.should_continue());
        assert!(synth.call_count() < 5);
    }
}
