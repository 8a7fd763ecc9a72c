//! Exponential backoff.

use std::time::Duration;

use tokio::time::Instant;

/// `base * 2^attempt`, capped at `max`.
pub fn exponential(base: Duration, attempt: u32, max: Duration) -> Duration {
    let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    base.checked_mul(factor).unwrap_or(max).min(max)
}

/// Backoff ladder for rate-limit errors.
///
/// Successive calls to [`next_retry_at`](Self::next_retry_at) never return
/// an earlier instant than the previous call, whether the delay came from
/// the API's reported reset time or from the ladder. [`reset`](Self::reset)
/// starts over after a successful cycle.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    base: Duration,
    max: Duration,
    attempt: u32,
    last_retry_at: Option<Instant>,
}

impl BackoffPolicy {
    /// Creates a ladder starting at `base` and capped at `max`.
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            attempt: 0,
            last_retry_at: None,
        }
    }

    /// Computes when to retry after another rate-limit error.
    ///
    /// `reported` is the reset time announced by the API, if any.
    pub fn next_retry_at(&mut self, now: Instant, reported: Option<Instant>) -> Instant {
        let delay = exponential(self.base, self.attempt, self.max);
        self.attempt = self.attempt.saturating_add(1);

        let mut retry_at = reported.unwrap_or(now + delay).max(now);
        if let Some(last) = self.last_retry_at {
            retry_at = retry_at.max(last);
        }
        self.last_retry_at = Some(retry_at);
        retry_at
    }

    /// Consecutive rate-limit errors seen since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Starts the ladder over.
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.last_retry_at = None;
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(60), Duration::from_secs(30 * 60))
    }
}
