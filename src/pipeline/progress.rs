//! Session/cumulative timing and ETA estimation.
//!
//! Chunk "durations" are the intervals between successive completions in
//! this session, so the estimate already reflects however many workers run
//! in parallel.

use super::clock::Clock;
use crate::checkpoint::CheckpointStore;
use crate::error::Result;
use crate::keys::RunKey;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Point-in-time view for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub total_chunks: usize,
    /// Completed overall, including earlier sessions.
    pub completed: usize,
    pub failed: usize,
    pub session_elapsed: Duration,
    pub total_elapsed: Duration,
    /// `None` until the first chunk of this session completes.
    pub eta: Option<Duration>,
}

pub struct ProgressTracker<C: Clock> {
    clock: C,
    session_start: Instant,
    last_completion: Instant,
    prior: Duration,
    total_chunks: usize,
    completed_before: usize,
    completed_in_session: usize,
    failed: usize,
    recent: VecDeque<Duration>,
    window: usize,
    committed: bool,
}

impl<C: Clock> ProgressTracker<C> {
    /// Start timing a session.
    ///
    /// `completed_before` and `prior` come from the checkpoint of earlier
    /// sessions.
    pub fn new(
        clock: C,
        total_chunks: usize,
        completed_before: usize,
        prior: Duration,
        window: usize,
    ) -> Self {
        let now = clock.now();
        Self {
            clock,
            session_start: now,
            last_completion: now,
            prior,
            total_chunks,
            completed_before,
            completed_in_session: 0,
            failed: 0,
            recent: VecDeque::new(),
            window: window.max(1),
            committed: false,
        }
    }

    pub fn record_completion(&mut self) {
        let now = self.clock.now();
        let interval = now.saturating_duration_since(self.last_completion);
        self.last_completion = now;
        self.completed_in_session += 1;
        if self.recent.len() == self.window {
            self.recent.pop_front();
        }
        self.recent.push_back(interval);
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    pub fn session_elapsed(&self) -> Duration {
        self.clock.now().saturating_duration_since(self.session_start)
    }

    pub fn total_elapsed(&self) -> Duration {
        self.prior + self.session_elapsed()
    }

    pub fn completed(&self) -> usize {
        self.completed_before + self.completed_in_session
    }

    pub fn remaining(&self) -> usize {
        self.total_chunks
            .saturating_sub(self.completed())
            .saturating_sub(self.failed)
    }

    /// Moving average over the recent window, else the session average.
    pub fn average_chunk_time(&self) -> Option<Duration> {
        if self.completed_in_session == 0 {
            return None;
        }
        if !self.recent.is_empty() {
            let sum: Duration = self.recent.iter().sum();
            return Some(sum / self.recent.len() as u32);
        }
        Some(self.session_elapsed() / self.completed_in_session as u32)
    }

    pub fn eta(&self) -> Option<Duration> {
        let remaining = self.remaining();
        if remaining == 0 {
            return Some(Duration::ZERO);
        }
        self.average_chunk_time()
            .map(|avg| avg.saturating_mul(remaining as u32))
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total_chunks: self.total_chunks,
            completed: self.completed(),
            failed: self.failed,
            session_elapsed: self.session_elapsed(),
            total_elapsed: self.total_elapsed(),
            eta: self.eta(),
        }
    }

    /// Add this session's elapsed time to the run's cumulative time.
    ///
    /// Only the first call writes; later calls return `Ok(false)`.
    pub fn commit(&mut self, store: &CheckpointStore, key: &RunKey) -> Result<bool> {
        if self.committed {
            return Ok(false);
        }
        store.add_cumulative_time(key, self.session_elapsed().as_secs_f64())?;
        self.committed = true;
        Ok(true)
    }
}
