//! Dead-letter inspection handler.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{DeadLetterListResponse, PaginationParams};
use crate::app_state::AppState;

/// `GET /dead-letters` — Recently dead-lettered notifications.
#[utoipa::path(
    get,
    path = "/api/v1/dead-letters",
    tag = "Queues",
    summary = "List dead letters",
    description = "Returns the most recent undeliverable notifications, newest first, with the failure reason.",
    params(PaginationParams),
    responses(
        (status = 200, description = "Paginated dead letters", body = DeadLetterListResponse),
    )
)]
pub async fn list_dead_letters(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> impl IntoResponse {
    let mut entries = state.dead_letters.entries();
    entries.reverse();
    let (data, pagination) = params.paginate(entries);
    Json(DeadLetterListResponse { data, pagination })
}

/// Dead-letter routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/dead-letters", get(list_dead_letters))
}
