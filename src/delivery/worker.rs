//! Per-destination delivery worker.
//!
//! A worker owns the consuming side of one [`DispatchQueue`]. It sleeps
//! until an enqueue signal or a poll tick, then drains due notifications
//! one at a time within the destination's rate limit. Transient failures
//! are put back at the tail with exponential backoff; permanent failures
//! and exhausted retry budgets go to the dead-letter sink.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use futures_util::FutureExt;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::dead_letter::{DeadLetter, DeadLetterSink};
use super::error::DeliveryError;
use super::rate_limit::RateLimiter;
use super::retry::RetryPolicy;
use super::transport::Transport;
use crate::domain::{Destination, Notification, TrackerEvent, WorkerState};
use crate::queue::DispatchQueue;
use crate::telemetry::Observer;

/// Tuning shared by every worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Retry budget and backoff.
    pub retry: RetryPolicy,
    /// Fallback wake-up interval.
    pub poll_interval: Duration,
    /// Upper bound on a single delivery attempt.
    pub delivery_timeout: Duration,
    /// Attempts per drain cycle before yielding.
    pub batch_size: usize,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            poll_interval: Duration::from_millis(1000),
            delivery_timeout: Duration::from_secs(10),
            batch_size: 10,
        }
    }
}

/// Outcome counters of one drain cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Successful deliveries.
    pub delivered: usize,
    /// Transient failures put back with backoff.
    pub retried: usize,
    /// Notifications moved to the dead-letter sink.
    pub dead_lettered: usize,
    /// `true` if the cycle stopped because the rate limit was reached.
    pub rate_limited: bool,
}

/// Consumer of one destination's queue.
#[derive(Debug)]
pub struct DeliveryWorker {
    queue: Arc<DispatchQueue>,
    destination: watch::Receiver<Destination>,
    transport: Arc<dyn Transport>,
    limiter: RateLimiter,
    settings: WorkerSettings,
    dead_letters: Arc<dyn DeadLetterSink>,
    observer: Arc<dyn Observer>,
}

impl DeliveryWorker {
    /// Creates a worker. Destination changes published on `destination`
    /// (URL, rate limit, enabled flag) apply from the next drain cycle.
    #[must_use]
    pub fn new(
        queue: Arc<DispatchQueue>,
        destination: watch::Receiver<Destination>,
        transport: Arc<dyn Transport>,
        settings: WorkerSettings,
        dead_letters: Arc<dyn DeadLetterSink>,
        observer: Arc<dyn Observer>,
    ) -> Self {
        let limiter = RateLimiter::new(destination.borrow().rate_limit);
        Self {
            queue,
            destination,
            transport,
            limiter,
            settings,
            dead_letters,
            observer,
        }
    }

    /// Runs until `cancel` fires. An in-flight delivery is completed
    /// before returning; undelivered items stay in the queue.
    pub async fn run(mut self, cancel: CancellationToken) {
        let destination_id = self.queue.destination_id();
        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(%destination_id, "delivery worker started");

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = self.queue.notified() => {}
                _ = ticker.tick() => {}
            }
            self.apply_config_changes();
            self.drain(&cancel).await;
        }

        tracing::info!(
            %destination_id,
            remaining = self.queue.peek_size(),
            "delivery worker stopped"
        );
    }

    /// Delivers due notifications until the queue has nothing due, the
    /// rate limit is reached, the batch size is spent or `cancel` fires.
    pub async fn drain(&self, cancel: &CancellationToken) -> DrainReport {
        let mut report = DrainReport::default();
        if self.queue.peek_size() == 0 {
            return report;
        }
        let destination = self.destination.borrow().clone();
        if !destination.enabled {
            tracing::debug!(destination_id = %destination.id, "destination disabled, holding queue");
            return report;
        }
        if self.limiter.remaining_at(Instant::now()) == 0 {
            report.rate_limited = true;
            return report;
        }

        self.set_state(WorkerState::Draining);
        for _ in 0..self.settings.batch_size.max(1) {
            if cancel.is_cancelled() {
                break;
            }
            if self.limiter.remaining_at(Instant::now()) == 0 {
                report.rate_limited = true;
                break;
            }
            let Some(notification) = self.queue.dequeue_ready(1, Utc::now()).into_iter().next() else {
                break;
            };
            if !self.limiter.try_acquire() {
                self.queue.return_to_head(notification);
                report.rate_limited = true;
                break;
            }
            self.attempt(&destination, notification, &mut report).await;
        }
        if let Some(next_due) = self.queue.next_due() {
            tracing::debug!(
                destination_id = %destination.id,
                depth = self.queue.peek_size(),
                %next_due,
                "backlog waiting on backoff"
            );
        }
        self.set_state(WorkerState::Idle);
        report
    }

    async fn attempt(&self, destination: &Destination, mut notification: Notification, report: &mut DrainReport) {
        let timeout = self.settings.delivery_timeout;
        let delivery = AssertUnwindSafe(self.transport.deliver(destination, &notification)).catch_unwind();
        let outcome = match tokio::time::timeout(timeout, delivery).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                tracing::error!(
                    destination_id = %destination.id,
                    notification_id = %notification.id,
                    "transport panicked"
                );
                Err(DeliveryError::Transient {
                    reason: "transport panicked".to_string(),
                    retry_after: None,
                })
            }
            Err(_) => Err(DeliveryError::Transient {
                reason: format!("delivery timed out after {}ms", timeout.as_millis()),
                retry_after: None,
            }),
        };

        let err = match outcome {
            Ok(()) => {
                report.delivered += 1;
                self.observer.observe(TrackerEvent::Delivered {
                    destination_id: notification.destination_id,
                    notification_id: notification.id,
                    attempts: notification.attempts,
                    timestamp: Utc::now(),
                });
                return;
            }
            Err(err) => err,
        };

        notification.attempts = notification.attempts.saturating_add(1);
        if err.is_transient() && self.settings.retry.allows_retry(notification.attempts) {
            let mut delay = self.settings.retry.delay_for(notification.attempts);
            if let Some(hint) = err.retry_after() {
                self.limiter.block_for(hint);
                delay = delay.max(hint);
            }
            let now = Utc::now();
            notification.not_before = Some(
                TimeDelta::from_std(delay)
                    .ok()
                    .and_then(|d| now.checked_add_signed(d))
                    .unwrap_or(now),
            );
            self.observer.observe(TrackerEvent::DeliveryRetried {
                destination_id: notification.destination_id,
                notification_id: notification.id,
                attempts: notification.attempts,
                retry_in_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                reason: err.reason().to_string(),
                timestamp: now,
            });
            self.queue.requeue(notification);
            report.retried += 1;
        } else {
            self.observer.observe(TrackerEvent::DeadLettered {
                destination_id: notification.destination_id,
                notification_id: notification.id,
                attempts: notification.attempts,
                reason: err.reason().to_string(),
                timestamp: Utc::now(),
            });
            self.dead_letters.record(DeadLetter {
                notification,
                reason: err.reason().to_string(),
                permanent: !err.is_transient(),
                failed_at: Utc::now(),
            });
            report.dead_lettered += 1;
        }
    }

    fn apply_config_changes(&mut self) {
        if self.destination.has_changed().unwrap_or(false) {
            let limit = self.destination.borrow_and_update().rate_limit;
            self.limiter.reconfigure(limit);
        }
    }

    fn set_state(&self, state: WorkerState) {
        self.observer.observe(TrackerEvent::WorkerStateChanged {
            destination_id: self.queue.destination_id(),
            state,
            queue_depth: self.queue.peek_size(),
            timestamp: Utc::now(),
        });
    }
}
