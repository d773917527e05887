//! Dead-letter log for notifications that could not be delivered.

use std::collections::VecDeque;
use std::fmt::Debug;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use utoipa::ToSchema;

use crate::domain::Notification;

/// A notification that permanently failed, with the failure.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeadLetter {
    /// The undeliverable notification.
    pub notification: Notification,
    /// Last failure description.
    pub reason: String,
    /// `true` when the failure was permanent rather than an exhausted
    /// retry budget.
    pub permanent: bool,
    /// When the notification was dead-lettered.
    pub failed_at: DateTime<Utc>,
}

/// Sink for dead letters.
pub trait DeadLetterSink: Send + Sync + Debug {
    /// Records one dead letter. Must not block.
    fn record(&self, entry: DeadLetter);
}

/// Bounded in-memory dead-letter log with optional forwarding.
///
/// Keeps the most recent `capacity` entries for inspection and, when a
/// forwarder is attached, hands every entry to it (e.g. a persistence
/// task).
#[derive(Debug)]
pub struct DeadLetterLog {
    entries: Mutex<VecDeque<DeadLetter>>,
    capacity: usize,
    forward: Option<mpsc::UnboundedSender<DeadLetter>>,
}

impl DeadLetterLog {
    /// Creates a log keeping at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            forward: None,
        }
    }

    /// Forwards every recorded entry to `tx`.
    #[must_use]
    pub fn with_forwarder(mut self, tx: mpsc::UnboundedSender<DeadLetter>) -> Self {
        self.forward = Some(tx);
        self
    }

    /// Retained entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<DeadLetter> {
        self.lock().iter().cloned().collect()
    }

    /// Number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if no entry is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<DeadLetter>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl DeadLetterSink for DeadLetterLog {
    fn record(&self, entry: DeadLetter) {
        tracing::debug!(
            notification_id = %entry.notification.id,
            killmail_id = entry.notification.killmail_id,
            permanent = entry.permanent,
            "dead letter retained"
        );
        if let Some(tx) = &self.forward
            && tx.send(entry.clone()).is_err()
        {
            tracing::warn!("dead letter forwarder closed");
        }
        let mut entries = self.lock();
        entries.push_back(entry);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DestinationId, RuleId};

    fn letter(killmail_id: i64) -> DeadLetter {
        DeadLetter {
            notification: Notification::new(
                RuleId::new(),
                DestinationId::new(),
                killmail_id,
                serde_json::json!({}),
            ),
            reason: "gone".to_string(),
            permanent: true,
            failed_at: Utc::now(),
        }
    }

    #[test]
    fn keeps_most_recent_entries() {
        let log = DeadLetterLog::new(2);
        log.record(letter(1));
        log.record(letter(2));
        log.record(letter(3));
        let ids: Vec<i64> = log.entries().iter().map(|e| e.notification.killmail_id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[tokio::test]
    async fn forwards_entries() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let log = DeadLetterLog::new(10).with_forwarder(tx);
        log.record(letter(7));
        let forwarded = rx.recv().await.map(|e| e.notification.killmail_id);
        assert_eq!(forwarded, Some(7));
        assert_eq!(log.len(), 1);
    }
}
