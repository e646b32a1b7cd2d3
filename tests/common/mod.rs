#![allow(dead_code)]

use chunkvox::checkpoint::CheckpointStore;
use chunkvox::control::ShutdownController;
use chunkvox::driver::{ConversionRequest, Driver};
use chunkvox::pipeline::SchedulerConfig;
use chunkvox::synth::{MockSynthesizer, RetryPolicy};
use chunkvox::text::{BoundaryCache, Chunker};
use chunkvox::{RunKey, Speed};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

pub const SENTENCE: &str = "The quick brown fox jumps over the lazy dog. ";

/// `count` copies of a 45-character sentence.
pub fn sentences(count: usize) -> String {
    SENTENCE.repeat(count)
}

/// A document plus isolated state and output directories.
pub struct Harness {
    pub dir: TempDir,
    pub document: PathBuf,
}

impl Harness {
    pub fn new(text: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let document = dir.path().join("book.txt");
        std::fs::write(&document, text).unwrap();
        Self { dir, document }
    }

    pub fn state_dir(&self) -> PathBuf {
        self.dir.path().join("state")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("tts_audio_output")
    }

    pub fn key(&self) -> RunKey {
        RunKey::for_document(&self.document)
    }

    /// Store that keeps completed records, so tests can inspect them.
    pub fn store(&self) -> CheckpointStore {
        CheckpointStore::open(self.state_dir().join("checkpoints"))
            .unwrap()
            .with_prune_completed(false)
    }

    pub fn cache(&self) -> BoundaryCache {
        BoundaryCache::new(self.state_dir().join("boundaries"))
    }

    pub fn scheduler(workers: usize) -> SchedulerConfig {
        SchedulerConfig {
            workers,
            retry: RetryPolicy::new(3, Duration::from_millis(1)),
            poll_interval: Duration::from_millis(5),
            refresh_interval: Duration::from_millis(20),
            display_completed: 4,
        }
    }

    pub fn driver(&self, synth: MockSynthesizer, controller: ShutdownController) -> Driver {
        self.driver_with_workers(synth, controller, 3)
    }

    pub fn driver_with_workers(
        &self,
        synth: MockSynthesizer,
        controller: ShutdownController,
        workers: usize,
    ) -> Driver {
        Driver::new(
            self.store(),
            Chunker::with_cache(self.cache()),
            Box::new(synth),
            controller,
            Self::scheduler(workers),
        )
    }

    pub fn request(&self, max_chars: usize) -> ConversionRequest {
        ConversionRequest {
            document: self.document.clone(),
            output_dir: self.output_dir(),
            prefix: None,
            language: "en".to_string(),
            speed: Speed::Normal,
            max_chars,
            resume: true,
        }
    }

    pub fn artifact(&self, number: usize) -> PathBuf {
        self.output_dir().join(format!("chunk_{number}.mp3"))
    }
}
