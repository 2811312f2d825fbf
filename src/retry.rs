//! Exponential backoff for network operations.
//!
//! Every HTTP request in the crate runs through [`RetryPolicy::execute`]. Only
//! transient failures (timeouts, connection errors, 429/502/503/504) are
//! retried; anything else is returned on the first attempt.
//!
//! # Backoff Strategy
//!
//! ```text
//! delay(attempt_index) = min(base_delay * 2^attempt_index, max_delay)
//! ```
//!
//! There is no jitter on the backoff itself. Scrapers that fetch many pages
//! from one site separately sleep a [`polite_delay`] of 1–3 seconds before
//! each page.

use crate::error::NetworkError;
use rand::{Rng, rng};
use serde::Deserialize;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, warn};

/// HTTP statuses that are retried.
pub const TRANSIENT_STATUSES: [u16; 4] = [429, 502, 503, 504];

/// Whether an HTTP status should be retried.
pub fn is_transient_status(status: u16) -> bool {
    TRANSIENT_STATUSES.contains(&status)
}

/// Retry budget for one kind of request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Zero behaves like one.
    pub max_attempts: u32,
    /// Delay after the first failure; doubles after each further failure.
    #[serde(with = "millis")]
    pub base_delay: Duration,
    /// Upper bound for a single backoff sleep.
    #[serde(with = "millis")]
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            ..Self::default()
        }
    }

    /// Backoff before the attempt that follows failed attempt `attempt_index`.
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt_index).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails permanently, or the budget is spent.
    ///
    /// Returns the last error when every attempt failed.
    pub async fn execute<T, F, Fut>(&self, mut op: F) -> Result<T, NetworkError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, NetworkError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let total_t0 = Instant::now();
        let mut attempt_index = 0u32;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() => {
                    warn!(attempt = attempt_index + 1, error = %e, "Permanent failure; not retrying");
                    return Err(e);
                }
                Err(e) => {
                    if attempt_index + 1 >= max_attempts {
                        error!(
                            attempts = max_attempts,
                            elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                            error = %e,
                            "Request exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.delay_for(attempt_index);
                    warn!(
                        attempt = attempt_index + 1,
                        max = max_attempts,
                        ?delay,
                        error = %e,
                        "Request failed; backing off"
                    );
                    sleep(delay).await;
                    attempt_index += 1;
                }
            }
        }
    }
}

/// Run `op` under a one-off policy.
pub async fn execute<T, F, Fut>(op: F, max_attempts: u32, base_delay: Duration) -> Result<T, NetworkError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, NetworkError>>,
{
    RetryPolicy::new(max_attempts, base_delay).execute(op).await
}

/// Uniform random delay in `[1s, 3s)` between page requests to one site.
pub fn polite_delay() -> Duration {
    let ms: u64 = rng().random_range(1000..3000);
    Duration::from_millis(ms)
}

mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
