//! Observability events emitted by the engine, queues and workers.
//!
//! Every event is routed through the injected [`crate::telemetry::Observer`]
//! and, with the bundled telemetry, broadcast on the [`super::EventBus`] to
//! WebSocket subscribers.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{DestinationId, RuleId};

/// Drain state of a delivery worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Waiting for a poll tick or an enqueue signal.
    Idle,
    /// Delivering queued notifications.
    Draining,
}

/// Event describing a state change somewhere in the pipeline.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum TrackerEvent {
    /// A rule matched a killmail.
    KillmailMatched {
        /// Matching rule.
        rule_id: RuleId,
        /// Destination of the produced notification.
        destination_id: DestinationId,
        /// Matched killmail.
        killmail_id: i64,
        /// Evaluation timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A queue exceeded its capacity and evicted its oldest entry.
    QueueFull {
        /// Overflowing queue.
        destination_id: DestinationId,
        /// Evicted notification.
        evicted_id: uuid::Uuid,
        /// Total drops for this queue since start.
        dropped_total: u64,
        /// Eviction timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A notification was delivered.
    Delivered {
        /// Destination delivered to.
        destination_id: DestinationId,
        /// Delivered notification.
        notification_id: uuid::Uuid,
        /// Failed attempts before this success.
        attempts: u32,
        /// Delivery timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A delivery attempt failed transiently and was rescheduled.
    DeliveryRetried {
        /// Destination of the notification.
        destination_id: DestinationId,
        /// Rescheduled notification.
        notification_id: uuid::Uuid,
        /// Failed attempts so far.
        attempts: u32,
        /// Backoff before the next attempt in milliseconds.
        retry_in_ms: u64,
        /// Failure description.
        reason: String,
        /// Failure timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A notification was moved to the dead-letter log.
    DeadLettered {
        /// Destination of the notification.
        destination_id: DestinationId,
        /// Dead-lettered notification.
        notification_id: uuid::Uuid,
        /// Failed attempts.
        attempts: u32,
        /// Failure description.
        reason: String,
        /// Timestamp.
        timestamp: DateTime<Utc>,
    },

    /// An operator purged a queue.
    QueuePurged {
        /// Purged queue.
        destination_id: DestinationId,
        /// Number of removed notifications.
        purged: usize,
        /// Timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A worker switched between idle and draining.
    WorkerStateChanged {
        /// Worker's destination.
        destination_id: DestinationId,
        /// New state.
        state: WorkerState,
        /// Queue depth at the transition.
        queue_depth: usize,
        /// Timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl TrackerEvent {
    /// Returns the destination the event concerns.
    #[must_use]
    pub fn destination_id(&self) -> DestinationId {
        match self {
            Self::KillmailMatched { destination_id, .. }
            | Self::QueueFull { destination_id, .. }
            | Self::Delivered { destination_id, .. }
            | Self::DeliveryRetried { destination_id, .. }
            | Self::DeadLettered { destination_id, .. }
            | Self::QueuePurged { destination_id, .. }
            | Self::WorkerStateChanged { destination_id, .. } => *destination_id,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::KillmailMatched { .. } => "killmail_matched",
            Self::QueueFull { .. } => "queue_full",
            Self::Delivered { .. } => "delivered",
            Self::DeliveryRetried { .. } => "delivery_retried",
            Self::DeadLettered { .. } => "dead_lettered",
            Self::QueuePurged { .. } => "queue_purged",
            Self::WorkerStateChanged { .. } => "worker_state_changed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_full_serializes_with_tag() {
        let event = TrackerEvent::QueueFull {
            destination_id: DestinationId::new(),
            evicted_id: uuid::Uuid::new_v4(),
            dropped_total: 3,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap_or_default();
        assert!(json.contains("\"event_type\":\"queue_full\""));
        assert!(json.contains("\"dropped_total\":3"));
        assert_eq!(event.event_type_str(), "queue_full");
    }

    #[test]
    fn destination_id_accessor() {
        let id = DestinationId::new();
        let event = TrackerEvent::QueuePurged {
            destination_id: id,
            purged: 2,
            timestamp: Utc::now(),
        };
        assert_eq!(event.destination_id(), id);
    }
}
