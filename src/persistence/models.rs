//! Database models for queued notifications and dead letters.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{DestinationId, Notification, RuleId};

/// Pending notifications of one destination, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredQueue {
    /// Queue key.
    pub destination_id: DestinationId,
    /// Items in queue order.
    pub items: Vec<Notification>,
}

/// Column tuple of the `queued_notifications` table, minus `position`.
pub(crate) type QueuedRow = (
    Uuid,
    Uuid,
    Uuid,
    i64,
    serde_json::Value,
    DateTime<Utc>,
    i32,
    Option<DateTime<Utc>>,
);

/// Rebuilds a notification from a `queued_notifications` row.
pub(crate) fn notification_from_row(row: QueuedRow) -> Notification {
    let (id, destination_id, rule_id, killmail_id, payload, enqueued_at, attempts, not_before) = row;
    Notification {
        id,
        rule_id: RuleId::from_uuid(rule_id),
        destination_id: DestinationId::from_uuid(destination_id),
        killmail_id,
        payload,
        enqueued_at,
        attempts: u32::try_from(attempts).unwrap_or(0),
        not_before,
    }
}

/// Attempt counter as stored in an `INTEGER` column.
pub(crate) fn attempts_column(attempts: u32) -> i32 {
    i32::try_from(attempts).unwrap_or(i32::MAX)
}

/// Groups rows ordered by `(destination_id, position)` into queues.
pub(crate) fn group_rows(rows: Vec<QueuedRow>) -> Vec<StoredQueue> {
    let mut queues: Vec<StoredQueue> = Vec::new();
    for row in rows {
        let notification = notification_from_row(row);
        match queues.last_mut() {
            Some(queue) if queue.destination_id == notification.destination_id => {
                queue.items.push(notification);
            }
            _ => queues.push(StoredQueue {
                destination_id: notification.destination_id,
                items: vec![notification],
            }),
        }
    }
    queues
}
