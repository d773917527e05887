//! Concurrent map of dispatch queues keyed by destination.
//!
//! The outer map is guarded by a [`tokio::sync::RwLock`]; each queue does
//! its own locking, so producers and workers on different destinations
//! never contend.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::dispatch_queue::{DispatchQueue, QueueStats};
use crate::domain::DestinationId;
use crate::error::TrackerError;
use crate::telemetry::Observer;

/// Owner of every [`DispatchQueue`].
#[derive(Debug)]
pub struct QueueRegistry {
    queues: RwLock<HashMap<DestinationId, Arc<DispatchQueue>>>,
    max_size: usize,
    observer: Arc<dyn Observer>,
}

impl QueueRegistry {
    /// Creates an empty registry whose queues hold at most `max_size`
    /// items each.
    #[must_use]
    pub fn new(max_size: usize, observer: Arc<dyn Observer>) -> Self {
        Self {
            queues: RwLock::new(HashMap::new()),
            max_size,
            observer,
        }
    }

    /// Returns the queue for `destination_id`, creating it if needed.
    pub async fn get_or_create(&self, destination_id: DestinationId) -> Arc<DispatchQueue> {
        if let Some(queue) = self.queues.read().await.get(&destination_id) {
            return Arc::clone(queue);
        }
        let mut map = self.queues.write().await;
        let queue = map.entry(destination_id).or_insert_with(|| {
            Arc::new(DispatchQueue::new(
                destination_id,
                self.max_size,
                Arc::clone(&self.observer),
            ))
        });
        Arc::clone(queue)
    }

    /// Returns an existing queue.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::DestinationNotFound`] if no queue exists for
    /// the destination.
    pub async fn get(&self, destination_id: DestinationId) -> Result<Arc<DispatchQueue>, TrackerError> {
        self.queues
            .read()
            .await
            .get(&destination_id)
            .cloned()
            .ok_or(TrackerError::DestinationNotFound(*destination_id.as_uuid()))
    }

    /// Returns every queue.
    pub async fn all(&self) -> Vec<Arc<DispatchQueue>> {
        self.queues.read().await.values().cloned().collect()
    }

    /// Returns the stats of every queue, ordered by destination ID.
    pub async fn stats(&self) -> Vec<QueueStats> {
        let mut stats: Vec<QueueStats> = self
            .queues
            .read()
            .await
            .values()
            .map(|q| q.stats())
            .collect();
        stats.sort_by_key(|s| s.destination_id);
        stats
    }

    /// Total number of queued items across all destinations.
    pub async fn total_depth(&self) -> usize {
        self.queues
            .read()
            .await
            .values()
            .map(|q| q.peek_size())
            .sum()
    }

    /// Returns the number of queues.
    pub async fn len(&self) -> usize {
        self.queues.read().await.len()
    }

    /// Returns `true` if no queue exists.
    pub async fn is_empty(&self) -> bool {
        self.queues.read().await.is_empty()
    }
}
