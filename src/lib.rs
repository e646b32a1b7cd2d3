//! chunkvox - Resumable text-to-speech for long documents
//!
//! Splits a document into chunks, synthesizes them in parallel through an
//! external TTS tool, and checkpoints every finished chunk so an interrupted
//! run picks up where it stopped.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod artifact;
pub mod checkpoint;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod control;
pub mod defaults;
pub mod driver;
pub mod error;
pub mod keys;
pub mod output;
pub mod persist;
#[cfg(feature = "cli")]
pub mod picker;
pub mod pipeline;
pub mod synth;
pub mod sys;
pub mod text;

// Composition root - needs everything
#[cfg(feature = "cli")]
pub mod app;

// Core traits (document → synthesize → checkpoint)
pub use pipeline::clock::Clock;
pub use pipeline::display::DisplaySink;
pub use pipeline::scheduler::ResultHandler;
pub use synth::synthesizer::Synthesizer;

// Engine
pub use driver::{ConversionReport, ConversionRequest, Driver, RunOutcome};
pub use pipeline::scheduler::{Scheduler, SchedulerConfig};

// State
pub use checkpoint::{CheckpointRecord, CheckpointStore, RunStatus, Speed};
pub use keys::RunKey;

// Error handling
pub use error::{ChunkvoxError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.3.1+abc1234"` when git hash is available, `"0.3.1"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
