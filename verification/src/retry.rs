//! Bounded exponential backoff.

use std::time::Duration;

/// `attempts` counts every try, including the first. The delay before retry
/// `n` (0-based) is `base_backoff * 2^n`, capped at [`RetryPolicy::MAX_BACKOFF`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

    pub fn new(attempts: u32, base_backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base_backoff,
        }
    }

    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Whether another try is allowed after `tries` attempts have failed.
    pub fn should_retry(&self, tries: u32) -> bool {
        tries < self.attempts
    }

    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.base_backoff
            .saturating_mul(factor)
            .min(Self::MAX_BACKOFF)
    }
}
