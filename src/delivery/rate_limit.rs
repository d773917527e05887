//! Rolling-window rate limiter, one per destination.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

use crate::domain::RateLimit;

/// Longest remote-requested block.
pub const MAX_BLOCK: Duration = Duration::from_secs(24 * 3600);

#[derive(Debug)]
struct LimiterState {
    max_items: usize,
    window: Duration,
    sent: VecDeque<Instant>,
    blocked_until: Option<Instant>,
}

impl LimiterState {
    fn evict_expired(&mut self, now: Instant) {
        while let Some(front) = self.sent.front() {
            if now.saturating_duration_since(*front) >= self.window {
                self.sent.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Allows at most `max_items` deliveries in any `window`.
///
/// Uses `tokio::time::Instant` so tests can drive it with a paused clock.
#[derive(Debug)]
pub struct RateLimiter {
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    /// Creates a limiter from a destination's rate limit. A zero
    /// `max_items` is treated as one.
    #[must_use]
    pub fn new(limit: RateLimit) -> Self {
        Self {
            state: Mutex::new(LimiterState {
                max_items: usize::try_from(limit.max_items.max(1)).unwrap_or(usize::MAX),
                window: Duration::from_secs(limit.window_secs),
                sent: VecDeque::new(),
                blocked_until: None,
            }),
        }
    }

    /// Takes a permit if one is available now.
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    /// Takes a permit if one is available at `now`.
    pub fn try_acquire_at(&self, now: Instant) -> bool {
        let mut state = self.lock();
        if state.blocked_until.is_some_and(|until| now < until) {
            return false;
        }
        state.blocked_until = None;
        state.evict_expired(now);
        if state.sent.len() >= state.max_items {
            return false;
        }
        state.sent.push_back(now);
        true
    }

    /// Permits still available at `now`.
    #[must_use]
    pub fn remaining_at(&self, now: Instant) -> usize {
        let mut state = self.lock();
        if state.blocked_until.is_some_and(|until| now < until) {
            return 0;
        }
        state.evict_expired(now);
        state.max_items.saturating_sub(state.sent.len())
    }

    /// Refuses every permit for `duration`, used when the remote asks the
    /// caller to back off. Durations beyond [`MAX_BLOCK`] are clamped.
    pub fn block_for(&self, duration: Duration) {
        let now = Instant::now();
        let Some(until) = now.checked_add(duration.min(MAX_BLOCK)) else {
            return;
        };
        let mut state = self.lock();
        state.blocked_until = Some(state.blocked_until.map_or(until, |b| b.max(until)));
    }

    /// Applies a changed rate limit, keeping the send history.
    pub fn reconfigure(&self, limit: RateLimit) {
        let mut state = self.lock();
        state.max_items = usize::try_from(limit.max_items.max(1)).unwrap_or(usize::MAX);
        state.window = Duration::from_secs(limit.window_secs);
    }

    fn lock(&self) -> MutexGuard<'_, LimiterState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
