//! Bounded retry with exponential backoff for generation calls.

use docqa_core::{AppError, AppResult};
use std::future::Future;
use std::time::Duration;

/// Retry policy for model calls.
///
/// Attempt `n` (1-based) that fails with a retryable error is followed by a
/// pause of `base_delay * 2^(n-1)`, capped at `max_delay`. Each attempt runs
/// under its own timeout; an attempt that times out counts as retryable.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,

    pub base_delay: Duration,

    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(4000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Pause after the given failed attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self.base_delay.saturating_mul(1u32 << exponent);
        delay.min(self.max_delay)
    }

    /// Upper bound on the time spent sleeping between attempts.
    pub fn max_total_backoff(&self) -> Duration {
        (1..self.max_attempts).map(|attempt| self.delay_for(attempt)).sum()
    }

    /// Run `operation` until it succeeds, fails permanently or runs out of
    /// attempts.
    ///
    /// # Errors
    /// Non-retryable errors are returned unchanged on first occurrence.
    /// Exhausting every attempt yields `AppError::Generation` carrying the
    /// last failure.
    pub async fn run<F, Fut, T>(
        &self,
        operation_name: &str,
        timeout: Duration,
        mut operation: F,
    ) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let error = match tokio::time::timeout(timeout, operation()).await {
                Ok(Ok(value)) => {
                    if attempt > 1 {
                        tracing::info!("{} succeeded on attempt {}", operation_name, attempt);
                    }
                    return Ok(value);
                }
                Ok(Err(e)) => e,
                Err(_) => AppError::Timeout {
                    operation: operation_name.to_string(),
                    seconds: timeout.as_secs_f64(),
                },
            };

            if !error.is_retryable() {
                return Err(error);
            }

            if attempt >= self.max_attempts {
                tracing::warn!(
                    "{} failed after {} attempts: {}",
                    operation_name,
                    attempt,
                    error
                );
                return Err(AppError::Generation(format!(
                    "{} failed after {} attempts: {}",
                    operation_name, attempt, error
                )));
            }

            let delay = self.delay_for(attempt);
            tracing::warn!(
                "{} attempt {}/{} failed: {}; retrying in {}ms",
                operation_name,
                attempt,
                self.max_attempts,
                error,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }
    }
}
