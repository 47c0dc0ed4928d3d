//! Caller-side retry for conflicting writes.
//!
//! The engine surfaces [`Error::WriteConflict`](crate::Error::WriteConflict)
//! instead of retrying internally. Callers that want to keep trying wrap the
//! call in [`with_backoff`].

use std::{future::Future, time::Duration};

use crate::Result;

/// Exponential backoff without jitter.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
  pub initial:      Duration,
  pub max:          Duration,
  pub multiplier:   f64,
  /// Total attempts, the first one included.
  pub max_attempts: u32,
}

impl ExponentialBackoff {
  #[must_use]
  pub const fn new(initial: Duration, max: Duration) -> Self {
    Self { initial, max, multiplier: 2.0, max_attempts: 5 }
  }

  #[must_use]
  pub const fn with_multiplier(mut self, multiplier: f64) -> Self {
    self.multiplier = multiplier;
    self
  }

  #[must_use]
  pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
    self.max_attempts = max_attempts;
    self
  }

  /// Delay before retry number `attempt` (zero-based), never above `max`.
  /// Multipliers below 1.0 (or NaN) are treated as 1.0.
  pub fn delay(&self, attempt: u32) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let base = self.initial.as_secs_f64() * self.multiplier.max(1.0).powi(exponent);
    Duration::try_from_secs_f64(base).map_or(self.max, |d| d.min(self.max))
  }
}

impl Default for ExponentialBackoff {
  fn default() -> Self {
    Self::new(Duration::from_millis(10), Duration::from_secs(1))
  }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or runs out
/// of attempts. The last error is returned as-is.
pub async fn with_backoff<T, F, Fut>(backoff: &ExponentialBackoff, mut op: F) -> Result<T>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T>>,
{
  let mut attempt = 0;
  loop {
    match op().await {
      Err(err) if err.is_retryable() && attempt + 1 < backoff.max_attempts => {
        let delay = backoff.delay(attempt);
        tracing::debug!(
          attempt,
          delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
          error = %err,
          "retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
      }
      other => return other,
    }
  }
}
