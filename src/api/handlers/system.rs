//! System endpoints: health check and pipeline metrics.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::engine::RuleProvider;
use crate::telemetry::MetricsSnapshot;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
    rules: usize,
    workers: usize,
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, active rule count and running worker count.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is shutting down", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let dispatcher = state.tracker.dispatcher();
    let (status, label) = if dispatcher.is_shutting_down() {
        (StatusCode::SERVICE_UNAVAILABLE, "shutting_down")
    } else {
        (StatusCode::OK, "healthy")
    };
    (
        status,
        Json(HealthResponse {
            status: label.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            rules: state.tracker.rules().snapshot().rules().len(),
            workers: dispatcher.worker_count().await,
        }),
    )
}

/// Pipeline counters and gauges.
#[derive(Debug, Serialize, ToSchema)]
struct MetricsResponse {
    counters: MetricsSnapshot,
    queues: usize,
    total_depth: usize,
    dead_letters_retained: usize,
    ws_subscribers: usize,
    events_published: u64,
}

/// `GET /metrics` — Pipeline counters.
#[utoipa::path(
    get,
    path = "/api/v1/metrics",
    tag = "System",
    summary = "Pipeline metrics",
    description = "Returns match, delivery, retry, dead-letter and eviction counters since start, plus current queue gauges.",
    responses(
        (status = 200, description = "Current metrics", body = MetricsResponse),
    )
)]
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let queues = state.tracker.queues();
    Json(MetricsResponse {
        counters: state.telemetry.snapshot(),
        queues: queues.len().await,
        total_depth: queues.total_depth().await,
        dead_letters_retained: state.dead_letters.len(),
        ws_subscribers: state.event_bus.receiver_count(),
        events_published: state.event_bus.published(),
    })
}

/// Health route, mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}

/// Metrics route, mounted under /api/v1.
pub fn api_routes() -> Router<AppState> {
    Router::new().route("/metrics", get(metrics_handler))
}
