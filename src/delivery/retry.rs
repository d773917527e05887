//! Retry budget and exponential backoff.

use std::time::Duration;

/// How often and how patiently a notification is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delivery attempts before a notification is dead-lettered.
    pub max_attempts: u32,
    /// Backoff unit.
    pub base_delay: Duration,
    /// Backoff ceiling.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    /// Backoff after the `attempts`-th failure: `base_delay * 2^attempts`,
    /// capped at `max_delay`.
    #[must_use]
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let factor = 2u32.checked_pow(attempts).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// Returns `true` while another attempt is allowed after `attempts`
    /// failures.
    #[must_use]
    pub const fn allows_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}
