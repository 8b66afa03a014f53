//! Bounded retry with a fixed or growing interval.
//!
//! Every wait loop in the harness (peer id discovery, baseline reads,
//! propagation polling) goes through [`poll_until`], parameterized by a
//! [`RetryPolicy`].

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::trace;

/// How many times to try an operation and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first (0 is treated as 1).
    pub max_attempts: u32,

    /// Delay before the second attempt, in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Multiplier applied to the delay after each failed attempt.
    /// `1.0` keeps the interval fixed.
    #[serde(default = "default_backoff")]
    pub backoff: f64,

    /// Upper bound on the delay, in milliseconds.
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,
}

const fn default_interval_ms() -> u64 {
    1_000
}

const fn default_backoff() -> f64 {
    1.0
}

const fn default_max_interval_ms() -> u64 {
    30_000
}

impl RetryPolicy {
    /// A policy that retries every `interval` without backoff.
    #[must_use]
    pub fn fixed(max_attempts: u32, interval: Duration) -> Self {
        let interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        Self {
            max_attempts,
            interval_ms,
            backoff: default_backoff(),
            max_interval_ms: interval_ms.max(default_max_interval_ms()),
        }
    }

    /// Attempts actually made, never less than one.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to wait after the given failed attempt (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = if self.backoff.is_finite() && self.backoff > 1.0 {
            self.backoff.powi(i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX))
        } else {
            1.0
        };
        #[allow(clippy::cast_precision_loss)]
        let scaled = self.interval_ms as f64 * factor;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let millis = if scaled >= self.max_interval_ms as f64 {
            self.max_interval_ms.max(self.interval_ms)
        } else {
            scaled as u64
        };
        Duration::from_millis(millis)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(1, Duration::from_millis(default_interval_ms()))
    }
}

/// Run `op` until `done` accepts its output or the attempts run out.
///
/// `op` receives the 1-based attempt number. The last output is returned
/// whether or not it was accepted, so callers decide what an exhausted budget
/// means.
pub async fn poll_until<T, F, Fut, D>(policy: &RetryPolicy, mut op: F, mut done: D) -> T
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = T>,
    D: FnMut(&T) -> bool,
{
    let attempts = policy.attempts();
    let mut attempt = 1;
    loop {
        let output = op(attempt).await;
        if attempt >= attempts || done(&output) {
            return output;
        }
        let delay = policy.delay_after(attempt);
        trace!(attempt, attempts, ?delay, "condition not met, retrying");
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// Run a fallible `op` until it succeeds, returning the last error otherwise.
///
/// # Errors
///
/// Returns the error of the final attempt when every attempt failed.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    poll_until(policy, op, Result::is_ok).await
}
