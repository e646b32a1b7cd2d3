//! Concurrent chunk processing: worker pool, result aggregation, progress.

pub mod clock;
pub mod display;
pub mod progress;
pub mod recorder;
pub mod scheduler;
pub mod types;

pub use clock::{Clock, MockClock, SystemClock};
pub use display::{CollectorDisplay, DisplaySink, LogDisplay, TerminalDisplay, render_lines};
pub use progress::{ProgressSnapshot, ProgressTracker};
pub use recorder::CheckpointRecorder;
pub use scheduler::{ResultHandler, Scheduler, SchedulerConfig};
pub use types::{ChunkJob, ChunkOutcome, ChunkResult, RunSummary};
