//! Retry with backoff for cache calls that are safe to repeat.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use super::backend::CacheError;

const MAX_BACKOFF_SHIFT: u32 = 10;

/// Bounded exponential backoff for idempotent cache operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub retries: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, base_backoff: Duration) -> Self {
        Self {
            retries,
            base_backoff,
        }
    }

    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff
            .saturating_mul(1u32 << attempt.min(MAX_BACKOFF_SHIFT))
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error, or
    /// the retry budget is spent.
    pub async fn run<T, F, Fut>(&self, op: &'static str, mut operation: F) -> Result<T, CacheError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CacheError>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.retries && err.is_retryable() => {
                    let backoff = self.backoff(attempt);
                    attempt += 1;
                    debug!(
                        op,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "retrying cache operation"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}
