//! The [`QueueStore`] seam and its in-memory implementation.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::{Mutex, MutexGuard};

use futures_util::future::BoxFuture;

use super::models::StoredQueue;
use crate::delivery::DeadLetter;
use crate::domain::{DestinationId, Notification};
use crate::error::TrackerError;

/// Durable storage for queue contents and dead letters.
pub trait QueueStore: Send + Sync + Debug {
    /// Replaces the stored contents of one queue with `items`.
    fn save_queue<'a>(
        &'a self,
        destination_id: DestinationId,
        items: &'a [Notification],
    ) -> BoxFuture<'a, Result<(), TrackerError>>;

    /// Loads every stored queue, items in queue order.
    fn load_queues(&self) -> BoxFuture<'_, Result<Vec<StoredQueue>, TrackerError>>;

    /// Appends one dead letter.
    fn save_dead_letter<'a>(&'a self, entry: &'a DeadLetter) -> BoxFuture<'a, Result<(), TrackerError>>;
}

#[derive(Debug, Default)]
struct MemoryState {
    queues: BTreeMap<DestinationId, Vec<Notification>>,
    dead_letters: Vec<DeadLetter>,
}

/// Process-local queue store, used when no database is configured and in
/// tests.
#[derive(Debug, Default)]
pub struct MemoryQueueStore {
    state: Mutex<MemoryState>,
}

impl MemoryQueueStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored dead letters, oldest first.
    #[must_use]
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.lock().dead_letters.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl QueueStore for MemoryQueueStore {
    fn save_queue<'a>(
        &'a self,
        destination_id: DestinationId,
        items: &'a [Notification],
    ) -> BoxFuture<'a, Result<(), TrackerError>> {
        let mut state = self.lock();
        if items.is_empty() {
            state.queues.remove(&destination_id);
        } else {
            state.queues.insert(destination_id, items.to_vec());
        }
        Box::pin(async { Ok(()) })
    }

    fn load_queues(&self) -> BoxFuture<'_, Result<Vec<StoredQueue>, TrackerError>> {
        let queues: Vec<StoredQueue> = self
            .lock()
            .queues
            .iter()
            .map(|(destination_id, items)| StoredQueue {
                destination_id: *destination_id,
                items: items.clone(),
            })
            .collect();
        Box::pin(async move { Ok(queues) })
    }

    fn save_dead_letter<'a>(&'a self, entry: &'a DeadLetter) -> BoxFuture<'a, Result<(), TrackerError>> {
        self.lock().dead_letters.push(entry.clone());
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RuleId;

    fn notification(destination_id: DestinationId, killmail_id: i64) -> Notification {
        Notification::new(RuleId::new(), destination_id, killmail_id, serde_json::json!({}))
    }

    #[tokio::test]
    async fn save_replaces_previous_contents() {
        let store = MemoryQueueStore::new();
        let dest = DestinationId::new();
        let first = vec![notification(dest, 1), notification(dest, 2)];
        let second = vec![notification(dest, 3)];

        assert!(store.save_queue(dest, &first).await.is_ok());
        assert!(store.save_queue(dest, &second).await.is_ok());

        let loaded = store.load_queues().await.unwrap_or_default();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.first().map(|q| q.items.clone()), Some(second));
    }

    #[tokio::test]
    async fn empty_queue_is_removed() {
        let store = MemoryQueueStore::new();
        let dest = DestinationId::new();
        assert!(store.save_queue(dest, &[notification(dest, 1)]).await.is_ok());
        assert!(store.save_queue(dest, &[]).await.is_ok());
        assert!(store.load_queues().await.unwrap_or_default().is_empty());
    }
}
