//! Dispatch queue inspection and purge handlers.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{PurgeResponse, QueueListResponse};
use crate::app_state::AppState;
use crate::domain::DestinationId;
use crate::error::{ErrorResponse, TrackerError};
use crate::queue::QueueStats;

/// `GET /queues` — Depth and drop counters of every queue.
#[utoipa::path(
    get,
    path = "/api/v1/queues",
    tag = "Queues",
    summary = "List dispatch queues",
    description = "Returns depth, capacity and eviction count of every per-destination queue.",
    responses(
        (status = 200, description = "Queue stats", body = QueueListResponse),
    )
)]
pub async fn list_queues(State(state): State<AppState>) -> impl IntoResponse {
    let queues = state.tracker.queue_stats().await;
    let total_depth = queues.iter().map(|q| q.depth).sum();
    Json(QueueListResponse {
        queues,
        total_depth,
    })
}

/// `GET /queues/{id}` — Stats of one queue.
///
/// # Errors
///
/// Returns [`TrackerError::DestinationNotFound`] if the queue does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/queues/{id}",
    tag = "Queues",
    summary = "Get queue stats",
    params(
        ("id" = uuid::Uuid, Path, description = "Destination UUID"),
    ),
    responses(
        (status = 200, description = "Queue stats", body = QueueStats),
        (status = 404, description = "Queue not found", body = ErrorResponse),
    )
)]
pub async fn get_queue(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, TrackerError> {
    let stats = state.tracker.queue(DestinationId::from_uuid(id)).await?;
    Ok(Json(stats))
}

/// `DELETE /queues/{id}` — Drop every queued notification of a destination.
///
/// # Errors
///
/// Returns [`TrackerError::DestinationNotFound`] if the queue does not exist.
#[utoipa::path(
    delete,
    path = "/api/v1/queues/{id}",
    tag = "Queues",
    summary = "Purge a queue",
    description = "Removes all pending notifications of one destination and emits a QueuePurged event.",
    params(
        ("id" = uuid::Uuid, Path, description = "Destination UUID"),
    ),
    responses(
        (status = 200, description = "Queue purged", body = PurgeResponse),
        (status = 404, description = "Queue not found", body = ErrorResponse),
    )
)]
pub async fn purge_queue(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, TrackerError> {
    let purged = state.tracker.purge_queue(DestinationId::from_uuid(id)).await?;
    Ok(Json(PurgeResponse {
        destination_id: id,
        purged,
    }))
}

/// Queue routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/queues", get(list_queues))
        .route("/queues/{id}", get(get_queue).delete(purge_queue))
}
