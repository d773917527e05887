//! Observability: the [`Observer`] seam, bundled [`Telemetry`] and tracing
//! subscriber setup.
//!
//! The rule engine, queues and workers never log global state directly for
//! pipeline events. They report [`TrackerEvent`]s to an `Observer` handed to
//! them at construction. [`Telemetry`] is the production observer: it logs
//! each event through `tracing`, keeps delivery counters and forwards the
//! event to the [`EventBus`].

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tracing_subscriber::EnvFilter;
use utoipa::ToSchema;

use crate::domain::{EventBus, TrackerEvent};

/// Receiver of pipeline events.
pub trait Observer: Send + Sync + Debug {
    /// Handles one event. Must not block.
    fn observe(&self, event: TrackerEvent);
}

/// Observer that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn observe(&self, _event: TrackerEvent) {}
}

/// Point-in-time copy of the delivery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct MetricsSnapshot {
    /// Rule matches produced by the engine.
    pub matched: u64,
    /// Successful deliveries.
    pub delivered: u64,
    /// Transient failures that were rescheduled.
    pub retried: u64,
    /// Notifications moved to the dead-letter log.
    pub dead_lettered: u64,
    /// Notifications evicted from full queues.
    pub dropped: u64,
}

/// Logging, counting and broadcasting observer.
#[derive(Debug)]
pub struct Telemetry {
    event_bus: EventBus,
    matched: AtomicU64,
    delivered: AtomicU64,
    retried: AtomicU64,
    dead_lettered: AtomicU64,
    dropped: AtomicU64,
}

impl Telemetry {
    /// Creates telemetry publishing on `event_bus`.
    #[must_use]
    pub fn new(event_bus: EventBus) -> Self {
        Self {
            event_bus,
            matched: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            retried: AtomicU64::new(0),
            dead_lettered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Returns the bus events are forwarded to.
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Returns the current counter values.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            matched: self.matched.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

impl Observer for Telemetry {
    fn observe(&self, event: TrackerEvent) {
        match &event {
            TrackerEvent::KillmailMatched {
                rule_id,
                destination_id,
                killmail_id,
                ..
            } => {
                self.matched.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(%rule_id, %destination_id, killmail_id, "killmail matched");
            }
            TrackerEvent::QueueFull {
                destination_id,
                evicted_id,
                dropped_total,
                ..
            } => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    %destination_id,
                    %evicted_id,
                    dropped_total,
                    "dispatch queue full, oldest notification evicted"
                );
            }
            TrackerEvent::Delivered {
                destination_id,
                notification_id,
                attempts,
                ..
            } => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
                tracing::info!(%destination_id, %notification_id, attempts, "notification delivered");
            }
            TrackerEvent::DeliveryRetried {
                destination_id,
                notification_id,
                attempts,
                retry_in_ms,
                reason,
                ..
            } => {
                self.retried.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    %destination_id,
                    %notification_id,
                    attempts,
                    retry_in_ms,
                    reason = %reason,
                    "delivery failed, retry scheduled"
                );
            }
            TrackerEvent::DeadLettered {
                destination_id,
                notification_id,
                attempts,
                reason,
                ..
            } => {
                self.dead_lettered.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    %destination_id,
                    %notification_id,
                    attempts,
                    reason = %reason,
                    "notification dead-lettered"
                );
            }
            TrackerEvent::QueuePurged {
                destination_id,
                purged,
                ..
            } => {
                tracing::info!(%destination_id, purged, "dispatch queue purged");
            }
            TrackerEvent::WorkerStateChanged {
                destination_id,
                state,
                queue_depth,
                ..
            } => {
                tracing::trace!(%destination_id, ?state, queue_depth, "worker state changed");
            }
        }
        let _ = self.event_bus.publish(event);
    }
}

/// Installs the global `tracing` subscriber.
///
/// Honors `RUST_LOG`, defaulting to `info`. With `json = true` log lines are
/// emitted as JSON objects.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().with_current_span(true).init();
    } else {
        builder.init();
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::DestinationId;
    use chrono::Utc;

    #[tokio::test]
    async fn counts_and_forwards_events() {
        let telemetry = Telemetry::new(EventBus::new(16));
        let mut rx = telemetry.event_bus().subscribe();
        let destination_id = DestinationId::new();

        telemetry.observe(TrackerEvent::Delivered {
            destination_id,
            notification_id: uuid::Uuid::new_v4(),
            attempts: 0,
            timestamp: Utc::now(),
        });
        telemetry.observe(TrackerEvent::QueueFull {
            destination_id,
            evicted_id: uuid::Uuid::new_v4(),
            dropped_total: 1,
            timestamp: Utc::now(),
        });

        let snapshot = telemetry.snapshot();
        assert_eq!(snapshot.delivered, 1);
        assert_eq!(snapshot.dropped, 1);
        assert_eq!(snapshot.dead_lettered, 0);

        let Ok(first) = rx.recv().await else {
            panic!("expected forwarded event");
        };
        assert_eq!(first.event_type_str(), "delivered");
    }
}
