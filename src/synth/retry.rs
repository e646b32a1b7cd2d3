//! Bounded retry with exponential backoff.

use crate::config::SynthesisConfig;
use crate::control::CancelToken;
use crate::defaults::{MAX_RETRIES, RETRY_DELAY};
use crate::error::{ChunkvoxError, Result};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RETRIES,
            base_delay: RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn from_config(config: &SynthesisConfig) -> Self {
        Self::new(config.max_retries, config.retry_delay())
    }

    /// Wait after the 0-based `attempt` failed: `base * 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .unwrap_or(Duration::MAX)
    }

    /// Run `op` until it succeeds, attempts run out, or `cancel` fires.
    ///
    /// `op` receives the 0-based attempt number. Cancellation and a missing
    /// synthesis tool end the loop immediately; other errors are retried and
    /// the last one is returned.
    pub fn run<T>(
        &self,
        cancel: &CancelToken,
        mut op: impl FnMut(u32) -> Result<T>,
    ) -> Result<T> {
        let mut last_error = ChunkvoxError::SynthesisCancelled;
        for attempt in 0..self.max_attempts {
            if cancel.is_cancelled() {
                return Err(ChunkvoxError::SynthesisCancelled);
            }
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e @ ChunkvoxError::SynthesisCancelled)
                | Err(e @ ChunkvoxError::SynthesisToolNotFound { .. }) => return Err(e),
                Err(e) => {
                    let remaining = self.max_attempts - attempt - 1;
                    warn!(attempt = attempt + 1, remaining, error = %e, "synthesis attempt failed");
                    last_error = e;
                    if remaining > 0 && cancel.wait_timeout(self.delay_for(attempt)) {
                        return Err(ChunkvoxError::SynthesisCancelled);
                    }
                }
            }
        }
        Err(last_error)
    }
}
