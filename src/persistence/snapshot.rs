//! Periodic queue snapshots and the dead-letter writer task.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::store::QueueStore;
use crate::delivery::DeadLetter;
use crate::error::TrackerError;
use crate::queue::QueueRegistry;

/// Copies queue contents to and from a [`QueueStore`].
#[derive(Debug, Clone)]
pub struct QueueSnapshotter {
    registry: Arc<QueueRegistry>,
    store: Arc<dyn QueueStore>,
}

impl QueueSnapshotter {
    /// Creates a snapshotter for `registry`.
    #[must_use]
    pub fn new(registry: Arc<QueueRegistry>, store: Arc<dyn QueueStore>) -> Self {
        Self { registry, store }
    }

    /// Writes every queue to the store. Returns the number of items saved.
    ///
    /// # Errors
    ///
    /// Returns the first [`TrackerError::Persistence`] raised by the store.
    pub async fn persist_all(&self) -> Result<usize, TrackerError> {
        let mut saved = 0;
        for queue in self.registry.all().await {
            let items = queue.snapshot();
            self.store.save_queue(queue.destination_id(), &items).await?;
            saved += items.len();
        }
        Ok(saved)
    }

    /// Loads stored queues into the registry. Returns the number of items
    /// restored.
    ///
    /// # Errors
    ///
    /// Returns a [`TrackerError::Persistence`] if the store cannot be read.
    pub async fn restore(&self) -> Result<usize, TrackerError> {
        let mut restored = 0;
        for stored in self.store.load_queues().await? {
            restored += stored.items.len();
            tracing::info!(
                destination_id = %stored.destination_id,
                items = stored.items.len(),
                "restoring queue"
            );
            self.registry
                .get_or_create(stored.destination_id)
                .await
                .restore(stored.items);
        }
        Ok(restored)
    }

    /// Persists all queues every `interval` until `cancel` fires.
    pub async fn run(self, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match self.persist_all().await {
                        Ok(saved) => tracing::debug!(saved, "queue snapshot written"),
                        Err(e) => tracing::error!(error = %e, "queue snapshot failed"),
                    }
                }
            }
        }
    }
}

/// Spawns a task writing every dead letter received on `rx` to `store`.
///
/// The task ends when all senders are dropped, or when `stop` fires after
/// the entries already received have been written.
pub fn spawn_dead_letter_writer(
    store: Arc<dyn QueueStore>,
    mut rx: mpsc::UnboundedReceiver<DeadLetter>,
    stop: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                entry = rx.recv() => match entry {
                    Some(entry) => write_dead_letter(store.as_ref(), &entry).await,
                    None => break,
                },
                () = stop.cancelled() => {
                    while let Ok(entry) = rx.try_recv() {
                        write_dead_letter(store.as_ref(), &entry).await;
                    }
                    break;
                }
            }
        }
    })
}

async fn write_dead_letter(store: &dyn QueueStore, entry: &DeadLetter) {
    if let Err(e) = store.save_dead_letter(entry).await {
        tracing::error!(
            error = %e,
            notification_id = %entry.notification.id,
            "failed to persist dead letter"
        );
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::{DestinationId, Notification, RuleId};
    use crate::persistence::MemoryQueueStore;
    use crate::telemetry::NoopObserver;

    fn registry() -> Arc<QueueRegistry> {
        Arc::new(QueueRegistry::new(10, Arc::new(NoopObserver)))
    }

    #[tokio::test]
    async fn queues_survive_a_restart() {
        let store: Arc<dyn QueueStore> = Arc::new(MemoryQueueStore::new());
        let dest = DestinationId::new();

        let before = registry();
        let queue = before.get_or_create(dest).await;
        for id in 1..=3 {
            queue.enqueue(Notification::new(RuleId::new(), dest, id, serde_json::json!({})));
        }
        let saved = QueueSnapshotter::new(before, Arc::clone(&store)).persist_all().await;
        assert_eq!(saved.ok(), Some(3));

        let after = registry();
        let restored = QueueSnapshotter::new(Arc::clone(&after), store).restore().await;
        assert_eq!(restored.ok(), Some(3));
        let ids: Vec<i64> = after
            .get(dest)
            .await
            .map(|q| q.snapshot().iter().map(|n| n.killmail_id).collect())
            .unwrap_or_default();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn dead_letter_writer_persists_entries() {
        let store = Arc::new(MemoryQueueStore::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let stop = CancellationToken::new();
        let handle = spawn_dead_letter_writer(Arc::clone(&store) as Arc<dyn QueueStore>, rx, stop.clone());

        let dest = DestinationId::new();
        let sent = tx.send(DeadLetter {
            notification: Notification::new(RuleId::new(), dest, 9, serde_json::json!({})),
            reason: "410 Gone".to_string(),
            permanent: true,
            failed_at: Utc::now(),
        });
        assert!(sent.is_ok());
        stop.cancel();

        assert!(handle.await.is_ok());
        assert_eq!(store.dead_letters().len(), 1);
    }
}
