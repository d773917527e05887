//! Persistence layer: durable queue snapshots and the dead-letter table.
//!
//! Queue contents are written to a [`QueueStore`] periodically and on
//! shutdown, and loaded back at startup. The PostgreSQL implementation uses
//! `sqlx::PgPool`; [`MemoryQueueStore`] stands in when no database is
//! configured.

pub mod models;
pub mod postgres;
pub mod snapshot;
pub mod store;

pub use models::StoredQueue;
pub use postgres::PostgresQueueStore;
pub use snapshot::{QueueSnapshotter, spawn_dead_letter_writer};
pub use store::{MemoryQueueStore, QueueStore};
