//! Retry and pacing policy for remote calls.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry policy for transcript extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including first try)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff base: the wait after attempt `n` (0-indexed) is `base^n` seconds
    #[serde(default = "default_backoff_base")]
    pub backoff_base: f64,

    /// Upper bound on a single backoff wait, in seconds
    #[serde(default = "default_max_delay")]
    pub max_delay_seconds: f64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_base() -> f64 {
    2.0
}
fn default_max_delay() -> f64 {
    300.0
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base: default_backoff_base(),
            max_delay_seconds: default_max_delay(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_base: f64) -> Self {
        Self {
            max_attempts,
            backoff_base,
            ..Default::default()
        }
    }

    /// Wait after a failed attempt (0-indexed)
    pub fn delay_after_attempt(&self, attempt: u32) -> Duration {
        let secs = self
            .backoff_base
            .max(0.0)
            .powi(attempt as i32)
            .min(self.max_delay_seconds);

        seconds(secs)
    }

    /// Whether another attempt follows the given (0-indexed) attempt
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts
    }
}

/// Convert a configured number of seconds into a wait, treating
/// non-positive or non-finite values as no wait
pub fn seconds(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    }
}

/// Sleep for `wait` unless it is zero
pub async fn pause(wait: Duration) {
    if !wait.is_zero() {
        tokio::time::sleep(wait).await;
    }
}
