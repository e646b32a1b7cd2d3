//! Speech synthesis boundary.
//!
//! The engine only needs "turn this chunk into an audio file at this path".
//! Implementations must overwrite `destination` idempotently so a retried
//! call is safe.

use crate::checkpoint::Speed;
use crate::control::CancelToken;
use crate::error::{ChunkvoxError, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One chunk to synthesize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynthesisRequest<'a> {
    pub index: usize,
    pub text: &'a str,
    pub language: &'a str,
    pub speed: Speed,
}

pub trait Synthesizer: Send + Sync {
    /// Write the audio for `request` to `destination`.
    ///
    /// Should return [`ChunkvoxError::SynthesisCancelled`] promptly once
    /// `cancel` fires.
    fn synthesize(
        &self,
        request: &SynthesisRequest<'_>,
        destination: &Path,
        cancel: &CancelToken,
    ) -> Result<()>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

impl<T: Synthesizer> Synthesizer for Arc<T> {
    fn synthesize(
        &self,
        request: &SynthesisRequest<'_>,
        destination: &Path,
        cancel: &CancelToken,
    ) -> Result<()> {
        (**self).synthesize(request, destination, cancel)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

type SynthesisHook = Arc<dyn Fn(usize) + Send + Sync>;

/// In-memory synthesizer for tests.
///
/// Writes a small fake MP3 containing the chunk text. Clones share call
/// counters so a test can inspect calls after handing a clone to the engine.
#[derive(Clone, Default)]
pub struct MockSynthesizer {
    calls: Arc<AtomicUsize>,
    calls_by_index: Arc<Mutex<BTreeMap<usize, usize>>>,
    fail_all: bool,
    failing: BTreeSet<usize>,
    flaky: BTreeMap<usize, usize>,
    delay: Duration,
    hook: Option<SynthesisHook>,
}

impl MockSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call.
    pub fn with_failure(mut self) -> Self {
        self.fail_all = true;
        self
    }

    /// Always fail chunk `index`.
    pub fn failing_on(mut self, index: usize) -> Self {
        self.failing.insert(index);
        self
    }

    /// Fail the first `failures` attempts of chunk `index`, then succeed.
    pub fn flaky_on(mut self, index: usize, failures: usize) -> Self {
        self.flaky.insert(index, failures);
        self
    }

    /// Take this long per call (interruptible by cancellation).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Run `hook(index)` at the start of every call, e.g. to issue a stop
    /// command while a given chunk is in flight.
    pub fn on_synthesize(mut self, hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.hook = Some(Arc::new(hook));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, index: usize) -> usize {
        self.calls_by_index
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&index)
            .copied()
            .unwrap_or(0)
    }

    /// Indices that were synthesized at least once, ascending.
    pub fn indices_called(&self) -> Vec<usize> {
        self.calls_by_index
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .copied()
            .collect()
    }
}

impl Synthesizer for MockSynthesizer {
    fn synthesize(
        &self,
        request: &SynthesisRequest<'_>,
        destination: &Path,
        cancel: &CancelToken,
    ) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let attempt = {
            let mut by_index = self.calls_by_index.lock().unwrap_or_else(|e| e.into_inner());
            let count = by_index.entry(request.index).or_insert(0);
            *count += 1;
            *count
        };

        if let Some(hook) = &self.hook {
            hook(request.index);
        }

        if !self.delay.is_zero() && cancel.wait_timeout(self.delay) {
            return Err(ChunkvoxError::SynthesisCancelled);
        }

        let flaky_failure = self
            .flaky
            .get(&request.index)
            .is_some_and(|&failures| attempt <= failures);
        if self.fail_all || self.failing.contains(&request.index) || flaky_failure {
            return Err(ChunkvoxError::SynthesisFailed {
                message: format!("mock failure for chunk {}", request.index + 1),
            });
        }

        let mut bytes = b"ID3".to_vec();
        bytes.extend_from_slice(request.text.as_bytes());
        std::fs::write(destination, bytes)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(index: usize) -> SynthesisRequest<'static> {
        SynthesisRequest {
            index,
            text: "hello",
            language: "en",
            speed: Speed::Normal,
        }
    }

    #[test]
    fn mock_writes_artifact_and_counts() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("chunk_1.mp3");
        let mock = MockSynthesizer::new();
        let shared = mock.clone();

        mock.synthesize(&request(0), &dest, &CancelToken::new())
            .unwrap();
        assert!(dest.is_file());
        assert_eq!(shared.call_count(), 1);
        assert_eq!(shared.calls_for(0), 1);
    }

    #[test]
    fn mock_failures_are_per_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockSynthesizer::new().failing_on(1);
        let cancel = CancelToken::new();
        assert!(mock.synthesize(&request(0), &dir.path().join("a"), &cancel).is_ok());
        let err = mock
            .synthesize(&request(1), &dir.path().join("b"), &cancel)
            .unwrap_err();
        assert!(matches!(err, ChunkvoxError::SynthesisFailed { .. }));
        assert!(!dir.path().join("b").exists());
    }

    #[test]
    fn flaky_chunk_recovers() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockSynthesizer::new().flaky_on(0, 2);
        let cancel = CancelToken::new();
        let dest = dir.path().join("a");
        assert!(mock.synthesize(&request(0), &dest, &cancel).is_err());
        assert!(mock.synthesize(&request(0), &dest, &cancel).is_err());
        assert!(mock.synthesize(&request(0), &dest, &cancel).is_ok());
    }

    #[test]
    fn delay_is_cut_short_by_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockSynthesizer::new().with_delay(Duration::from_secs(30));
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = mock
            .synthesize(&request(0), &dir.path().join("a"), &cancel)
            .unwrap_err();
        assert!(matches!(err, ChunkvoxError::SynthesisCancelled));
    }

    #[test]
    fn hook_sees_index() {
        let dir = tempfile::tempdir().unwrap();
        let seen = Arc::new(AtomicUsize::new(usize::MAX));
        let sink = seen.clone();
        let mock = MockSynthesizer::new().on_synthesize(move |i| sink.store(i, Ordering::SeqCst));
        mock.synthesize(&request(7), &dir.path().join("a"), &CancelToken::new())
            .unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn synthesizer_is_object_safe() {
        let boxed: Box<dyn Synthesizer> = Box::new(MockSynthesizer::new());
        assert_eq!(boxed.name(), "mock");
    }
}
