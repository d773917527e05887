//! PostgreSQL implementation of the queue store.

use futures_util::future::BoxFuture;
use sqlx::PgPool;

use super::models::{QueuedRow, StoredQueue, attempts_column, group_rows};
use super::store::QueueStore;
use crate::delivery::DeadLetter;
use crate::domain::{DestinationId, Notification};
use crate::error::TrackerError;

/// PostgreSQL-backed queue store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresQueueStore {
    pool: PgPool,
}

impl PostgresQueueStore {
    /// Creates a store on the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the bundled schema migrations.
    ///
    /// # Errors
    ///
    /// Returns a [`TrackerError::Persistence`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), TrackerError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| TrackerError::Persistence(format!("migration failed: {e}")))
    }

    async fn replace_queue(
        &self,
        destination_id: DestinationId,
        items: &[Notification],
    ) -> Result<(), TrackerError> {
        let destination = *destination_id.as_uuid();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM queued_notifications WHERE destination_id = $1")
            .bind(destination)
            .execute(&mut *tx)
            .await?;

        for (position, item) in items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO queued_notifications \
                 (id, destination_id, position, rule_id, killmail_id, payload, enqueued_at, attempts, not_before) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(item.id)
            .bind(destination)
            .bind(i64::try_from(position).unwrap_or(i64::MAX))
            .bind(*item.rule_id.as_uuid())
            .bind(item.killmail_id)
            .bind(&item.payload)
            .bind(item.enqueued_at)
            .bind(attempts_column(item.attempts))
            .bind(item.not_before)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn fetch_queues(&self) -> Result<Vec<StoredQueue>, TrackerError> {
        let rows = sqlx::query_as::<_, QueuedRow>(
            "SELECT id, destination_id, rule_id, killmail_id, payload, enqueued_at, attempts, not_before \
             FROM queued_notifications ORDER BY destination_id, position",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(group_rows(rows))
    }

    async fn insert_dead_letter(&self, entry: &DeadLetter) -> Result<(), TrackerError> {
        let n = &entry.notification;
        sqlx::query(
            "INSERT INTO dead_letters \
             (notification_id, destination_id, rule_id, killmail_id, payload, attempts, reason, permanent, failed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(n.id)
        .bind(*n.destination_id.as_uuid())
        .bind(*n.rule_id.as_uuid())
        .bind(n.killmail_id)
        .bind(&n.payload)
        .bind(attempts_column(n.attempts))
        .bind(&entry.reason)
        .bind(entry.permanent)
        .bind(entry.failed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

impl QueueStore for PostgresQueueStore {
    fn save_queue<'a>(
        &'a self,
        destination_id: DestinationId,
        items: &'a [Notification],
    ) -> BoxFuture<'a, Result<(), TrackerError>> {
        Box::pin(self.replace_queue(destination_id, items))
    }

    fn load_queues(&self) -> BoxFuture<'_, Result<Vec<StoredQueue>, TrackerError>> {
        Box::pin(self.fetch_queues())
    }

    fn save_dead_letter<'a>(&'a self, entry: &'a DeadLetter) -> BoxFuture<'a, Result<(), TrackerError>> {
        Box::pin(self.insert_dead_letter(entry))
    }
}
