//! Bounded per-destination FIFO of notifications.
//!
//! All queue state sits behind one [`std::sync::Mutex`]. The lock is only
//! held for in-memory work and never across an `.await`, so queue
//! operations complete immediately for both the producer (ingestion) and
//! the consumer (delivery worker).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Notify;
use utoipa::ToSchema;

use crate::domain::{DestinationId, Notification, TrackerEvent};
use crate::telemetry::Observer;

/// Result of [`DispatchQueue::enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Appended without eviction.
    Queued,
    /// Appended; the oldest entry was evicted to stay within capacity.
    Evicted {
        /// ID of the evicted notification.
        evicted_id: uuid::Uuid,
    },
}

/// Depth and drop counters of one queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct QueueStats {
    /// Queue key.
    #[schema(value_type = uuid::Uuid)]
    pub destination_id: DestinationId,
    /// Items currently queued.
    pub depth: usize,
    /// Items evicted since start.
    pub dropped: u64,
    /// Capacity.
    pub max_size: usize,
}

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<Notification>,
    dropped: u64,
}

/// FIFO of notifications for one destination.
#[derive(Debug)]
pub struct DispatchQueue {
    destination_id: DestinationId,
    max_size: usize,
    state: Mutex<QueueState>,
    signal: Notify,
    observer: Arc<dyn Observer>,
}

impl DispatchQueue {
    /// Creates an empty queue holding at most `max_size` items (minimum 1).
    #[must_use]
    pub fn new(destination_id: DestinationId, max_size: usize, observer: Arc<dyn Observer>) -> Self {
        Self {
            destination_id,
            max_size: max_size.max(1),
            state: Mutex::new(QueueState::default()),
            signal: Notify::new(),
            observer,
        }
    }

    /// Queue key.
    #[must_use]
    pub const fn destination_id(&self) -> DestinationId {
        self.destination_id
    }

    /// Capacity.
    #[must_use]
    pub const fn max_size(&self) -> usize {
        self.max_size
    }

    /// Appends `notification` at the tail and wakes the worker.
    ///
    /// When the queue is over capacity the oldest entry is evicted, the drop
    /// counter is incremented and a [`TrackerEvent::QueueFull`] warning is
    /// reported. Never fails.
    pub fn enqueue(&self, notification: Notification) -> EnqueueOutcome {
        let outcome = self.push(notification, false);
        self.signal.notify_one();
        outcome
    }

    /// Puts a notification back at the tail after a failed delivery
    /// attempt. Same capacity rules as [`DispatchQueue::enqueue`], but the
    /// worker is not signalled: the retry waits for its backoff deadline.
    pub fn requeue(&self, notification: Notification) -> EnqueueOutcome {
        self.push(notification, false)
    }

    /// Puts back an item that was dequeued but never attempted, at the
    /// head. If the queue filled up in the meantime the item is the oldest
    /// and is evicted.
    pub fn return_to_head(&self, notification: Notification) -> EnqueueOutcome {
        self.push(notification, true)
    }

    /// Removes and returns up to `max_n` items from the head, in order.
    /// Returns an empty vector when the queue is empty.
    pub fn dequeue_batch(&self, max_n: usize) -> Vec<Notification> {
        let mut state = self.lock();
        let n = max_n.min(state.items.len());
        state.items.drain(..n).collect()
    }

    /// Like [`DispatchQueue::dequeue_batch`], but skips items whose backoff
    /// deadline is after `now`. Skipped items keep their relative order.
    pub fn dequeue_ready(&self, max_n: usize, now: DateTime<Utc>) -> Vec<Notification> {
        let mut state = self.lock();
        let mut out = Vec::new();
        let mut i = 0;
        while out.len() < max_n && i < state.items.len() {
            if state.items.get(i).is_some_and(|n| n.is_due(now)) {
                match state.items.remove(i) {
                    Some(item) => out.push(item),
                    None => break,
                }
            } else {
                i += 1;
            }
        }
        out
    }

    /// Earliest backoff deadline among queued items, if any is waiting on
    /// one.
    #[must_use]
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.lock().items.iter().filter_map(|n| n.not_before).min()
    }

    /// Current number of queued items.
    #[must_use]
    pub fn peek_size(&self) -> usize {
        self.lock().items.len()
    }

    /// Number of evictions since start.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.lock().dropped
    }

    /// Depth and drop counters.
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        let state = self.lock();
        QueueStats {
            destination_id: self.destination_id,
            depth: state.items.len(),
            dropped: state.dropped,
            max_size: self.max_size,
        }
    }

    /// Removes every queued item and returns how many were removed.
    pub fn purge(&self) -> usize {
        let purged = {
            let mut state = self.lock();
            let n = state.items.len();
            state.items.clear();
            n
        };
        self.observer.observe(TrackerEvent::QueuePurged {
            destination_id: self.destination_id,
            purged,
            timestamp: Utc::now(),
        });
        purged
    }

    /// Copy of the queued items, head first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Notification> {
        self.lock().items.iter().cloned().collect()
    }

    /// Appends items recovered from the queue store at startup. Capacity
    /// is enforced, but no warnings are reported.
    pub fn restore(&self, items: Vec<Notification>) {
        let mut state = self.lock();
        for item in items {
            state.items.push_back(item);
            if state.items.len() > self.max_size {
                state.items.pop_front();
                state.dropped = state.dropped.saturating_add(1);
            }
        }
        drop(state);
        self.signal.notify_one();
    }

    /// Waits for the next enqueue signal.
    pub async fn notified(&self) {
        self.signal.notified().await;
    }

    fn push(&self, notification: Notification, at_head: bool) -> EnqueueOutcome {
        let mut state = self.lock();
        if at_head {
            state.items.push_front(notification);
        } else {
            state.items.push_back(notification);
        }
        if state.items.len() <= self.max_size {
            return EnqueueOutcome::Queued;
        }
        let Some(evicted) = state.items.pop_front() else {
            return EnqueueOutcome::Queued;
        };
        state.dropped = state.dropped.saturating_add(1);
        let dropped_total = state.dropped;
        drop(state);

        self.observer.observe(TrackerEvent::QueueFull {
            destination_id: self.destination_id,
            evicted_id: evicted.id,
            dropped_total,
            timestamp: Utc::now(),
        });
        EnqueueOutcome::Evicted {
            evicted_id: evicted.id,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
