//! Axum WebSocket upgrade handler.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use super::connection::run_connection;
use crate::app_state::AppState;

/// `GET /ws` — Stream tracker events. Refused with 503 once shutdown has
/// begun.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    if state.tracker.dispatcher().is_shutting_down() {
        return (StatusCode::SERVICE_UNAVAILABLE, "shutting down").into_response();
    }
    // Receiver exists before the handshake completes.
    let events = state.event_bus.subscribe();
    let tracker = Arc::clone(&state.tracker);
    tracing::debug!(subscribers = state.event_bus.receiver_count(), "ws client connecting");

    ws.on_upgrade(move |socket| run_connection(socket, events, tracker))
}
