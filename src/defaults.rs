//! Default configuration constants for chunkvox.
//!
//! Shared by the configuration types and the engine so both agree on the
//! same values without duplicating literals.

use std::time::Duration;

/// Maximum characters per chunk.
///
/// 5000 characters keeps each request comfortably below the length limits
/// of common online TTS endpoints while producing few, long audio files.
pub const MAX_CHUNK_CHARS: usize = 5000;

/// Total synthesis attempts per chunk before it is marked failed.
pub const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff between attempts.
///
/// Attempt `n` (0-based) waits `RETRY_DELAY * 2^n` before the next one.
pub const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Number of concurrent synthesis workers in parallel mode.
pub const MAX_PARALLEL_CHUNKS: usize = 4;

/// Default speech language code.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Output directory name used when none is given.
pub const DEFAULT_OUTPUT_DIR: &str = "tts_audio_output";

/// Prefix used for artifact names when neither a prefix nor a custom
/// directory name is available.
pub const DEFAULT_PREFIX: &str = "chunk";

/// File extension of produced audio artifacts.
pub const AUDIO_EXTENSION: &str = "mp3";

/// External synthesis command used by [`crate::synth::CommandSynthesizer`].
pub const SYNTHESIS_COMMAND: &str = "gtts-cli";

/// Flag appended to the synthesis command for slow speech.
pub const SLOW_FLAG: &str = "--slow";

/// How often the live display is refreshed when no results arrive.
pub const DISPLAY_REFRESH: Duration = Duration::from_millis(1000);

/// How long the aggregator waits on the result channel before refreshing.
pub const RESULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Number of recent chunk durations used for the moving-average ETA.
pub const ETA_WINDOW: usize = 5;

/// Maximum completed-chunk lines kept in the live display.
pub const DISPLAY_COMPLETED_LINES: usize = 4;

/// Directory name under the platform data dir holding checkpoints and
/// boundary caches.
pub const STATE_DIR_NAME: &str = "chunkvox";

/// Suffix of boundary cache files.
pub const BOUNDARY_CACHE_SUFFIX: &str = ".boundaries.json";

/// Suffix of checkpoint record files.
pub const CHECKPOINT_SUFFIX: &str = ".checkpoint.json";
