//! Persistent run state for resumable conversions.

pub mod record;
pub mod store;

pub use record::{CheckpointRecord, RunStatus, Speed, unix_now};
pub use store::{ArtifactPolicy, CheckpointStore, PurgeReport};
