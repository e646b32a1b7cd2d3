//! Speech synthesis clients and retry handling.

pub mod command;
pub mod retry;
pub mod synthesizer;

pub use command::CommandSynthesizer;
pub use retry::RetryPolicy;
pub use synthesizer::{MockSynthesizer, SynthesisRequest, Synthesizer};
