//! Exponential-backoff retry policy for LLM adapter calls.
//!
//! Backoff doubles each attempt: base -> base*2 -> base*4 ..., capped at
//! `max_backoff_ms`. Only errors classified transient by
//! [`SubstrateError::is_transient`] are retried.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use crate::domain::ports::llm_substrate::SubstrateError;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff_ms: 2_000,
            max_backoff_ms: 60_000,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self { max_attempts, base_backoff_ms, max_backoff_ms }
    }

    /// Run `operation` up to `max_attempts` times, retrying only on
    /// transient [`SubstrateError`]s with exponential backoff between
    /// attempts.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, SubstrateError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SubstrateError>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let should_retry = err.is_transient() && attempt + 1 < self.max_attempts;
                    if !should_retry {
                        return Err(err);
                    }
                    let backoff = self.calculate_backoff(attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "retrying transient llm substrate error"
                    );
                    sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }

    fn calculate_backoff(&self, attempt: u32) -> Duration {
        let backoff_ms = self
            .base_backoff_ms
            .saturating_mul(2_u64.saturating_pow(attempt))
            .min(self.max_backoff_ms);
        Duration::from_millis(backoff_ms)
    }
}
