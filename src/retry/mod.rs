//! Bounded exponential backoff shared by every external call.
//!
//! A [`RetryPolicy`] is `(max_attempts, backoff, retryable predicate)`. The retriever,
//! the judge (schema corrections) and the orchestrator (model backend outages) all
//! drive their loops through [`RetryPolicy::run_if`] so attempts, delays and logging
//! look the same everywhere.


use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// Errors that know whether another attempt could succeed.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Always at least 1.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Growth factor applied per additional attempt.
    pub multiplier: f64,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            multiplier: 2.0,
            max_delay,
        }
    }

    /// Retries back-to-back without sleeping.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO)
    }

    /// A single attempt, never retried.
    pub fn none() -> Self {
        Self::immediate(1)
    }

    /// Delay to wait after `failed_attempt` (1-based) failed.
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let exponent = failed_attempt.saturating_sub(1).min(32) as i32;
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or attempts run out.
    pub async fn run<T, E, F, Fut>(&self, label: &str, op: F) -> Result<T, E>
    where
        E: Retryable + Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_if(label, |e: &E| e.is_retryable(), op).await
    }

    /// Like [`run`](Self::run) but with an explicit retryable predicate.
    ///
    /// `op` receives the 1-based attempt number. The last error is returned unchanged.
    pub async fn run_if<T, E, P, F, Fut>(&self, label: &str, retry_if: P, mut op: F) -> Result<T, E>
    where
        E: Display,
        P: Fn(&E) -> bool,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(label, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    if attempt >= max_attempts || !retry_if(&err) {
                        return Err(err);
                    }
                    let delay = self.delay_after(attempt);
                    warn!(
                        label,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Attempt failed, retrying"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}
