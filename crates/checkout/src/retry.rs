//! Retry with exponential backoff for post-commit side effects.

use std::future::Future;
use std::time::Duration;

use crate::error::ServiceError;

/// Backoff settings for retried collaborator calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts including the first one. Never less than 1.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Factor applied to the delay after each retry.
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// A policy that makes a single attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31) as i32;
        let scaled = self.base_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        if !scaled.is_finite() || scaled >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(scaled.max(0.0))
        }
    }

    /// Runs `op` until it succeeds, fails permanently, or the attempt budget
    /// is spent. Only transient errors are retried.
    ///
    /// Returns the final result together with the number of attempts made.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> (Result<T, ServiceError>, u32)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return (Ok(value), attempt),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient failure, retrying"
                    );
                    metrics::counter!("fulfillment_retries_total").increment(1);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return (Err(e), attempt),
            }
        }
    }
}
