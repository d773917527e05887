//! Killmail ingestion handler.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{BatchIngestResponse, IngestRequest, RejectedRecord};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, TrackerError};
use crate::service::IngestReport;

/// `POST /killmails` — Evaluate killmails against the active rules.
///
/// # Errors
///
/// Returns [`TrackerError::InvalidRecord`] when a single killmail is
/// malformed and [`TrackerError::InvalidRequest`] for an empty batch.
/// Malformed entries of a batch are reported in the response instead.
#[utoipa::path(
    post,
    path = "/api/v1/killmails",
    tag = "Killmails",
    summary = "Ingest killmails",
    description = "Evaluates one killmail (JSON object) or a batch (JSON array) against every enabled rule and queues a notification per match. A malformed batch entry does not affect the others.",
    request_body = IngestRequest,
    responses(
        (status = 202, description = "Single killmail evaluated", body = IngestReport),
        (status = 207, description = "Batch evaluated", body = BatchIngestResponse),
        (status = 400, description = "Malformed killmail or empty batch", body = ErrorResponse),
    )
)]
pub async fn ingest_killmails(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Result<Response, TrackerError> {
    match req {
        IngestRequest::Single(raw) => {
            let report = state.tracker.ingest(*raw).await?;
            Ok((StatusCode::ACCEPTED, Json(report)).into_response())
        }
        IngestRequest::Batch(raws) => {
            if raws.is_empty() {
                return Err(TrackerError::InvalidRequest("empty batch".to_string()));
            }
            let ids: Vec<i64> = raws.iter().map(|r| r.killmail_id).collect();
            let results = state.tracker.ingest_batch(raws).await;

            let mut accepted = Vec::new();
            let mut rejected = Vec::new();
            for (index, (killmail_id, result)) in ids.into_iter().zip(results).enumerate() {
                match result {
                    Ok(report) => accepted.push(report),
                    Err(e) => rejected.push(RejectedRecord {
                        index,
                        killmail_id,
                        message: e.to_string(),
                    }),
                }
            }
            let response = BatchIngestResponse { accepted, rejected };
            Ok((StatusCode::MULTI_STATUS, Json(response)).into_response())
        }
    }
}

/// Killmail routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/killmails", post(ingest_killmails))
}
