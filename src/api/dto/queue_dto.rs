//! Dispatch queue DTOs.

use serde::Serialize;
use utoipa::ToSchema;

use super::common_dto::PaginationMeta;
use crate::delivery::DeadLetter;
use crate::queue::QueueStats;

/// Response body for `GET /queues`.
#[derive(Debug, Serialize, ToSchema)]
pub struct QueueListResponse {
    /// Per-destination queue stats.
    pub queues: Vec<QueueStats>,
    /// Sum of all queue depths.
    pub total_depth: usize,
}

/// Response body for `DELETE /queues/{id}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct PurgeResponse {
    /// Purged queue.
    pub destination_id: uuid::Uuid,
    /// Notifications removed.
    pub purged: usize,
}

/// Paginated response body for `GET /dead-letters`, newest first.
#[derive(Debug, Serialize, ToSchema)]
pub struct DeadLetterListResponse {
    /// Dead letters on this page.
    pub data: Vec<DeadLetter>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}
