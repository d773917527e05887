//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection,
//! dispatching incoming commands and forwarding filtered events.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::messages::{WsCommand, WsMessage, WsMessageType};
use super::subscription::SubscriptionManager;
use crate::domain::{DestinationId, TrackerEvent};
use crate::service::TrackerService;

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads commands from the client and dispatches them.
/// - Forwards matching events from the [`broadcast::Receiver`] to the client.
pub async fn run_connection(
    socket: WebSocket,
    mut event_rx: broadcast::Receiver<TrackerEvent>,
    tracker: Arc<TrackerService>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subs = SubscriptionManager::new();

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let response = handle_text_message(&text, &mut subs, &tracker).await;
                        if let Some(resp_json) = response
                            && ws_tx.send(Message::text(resp_json)).await.is_err() {
                                break;
                            }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
            event = event_rx.recv() => {
                match event {
                    Ok(tracker_event) => {
                        if subs.matches(&tracker_event) {
                            let msg = WsMessage::new(
                                uuid::Uuid::new_v4().to_string(),
                                WsMessageType::Event,
                                serde_json::to_value(&tracker_event).unwrap_or_default(),
                            );
                            let json = serde_json::to_string(&msg).unwrap_or_default();
                            if ws_tx.send(Message::text(json)).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "ws client lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!("ws connection closed");
}

/// Handles a text message from the client, returning an optional JSON response.
async fn handle_text_message(
    text: &str,
    subs: &mut SubscriptionManager,
    tracker: &TrackerService,
) -> Option<String> {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        return serde_json::to_string(&WsMessage::error("", 400, "malformed JSON")).ok();
    };
    let Ok(command) = serde_json::from_value::<WsCommand>(msg.payload) else {
        return serde_json::to_string(&WsMessage::error(msg.id, 404, "unknown command")).ok();
    };

    let reply = match command {
        WsCommand::Subscribe {
            destination_ids,
            event_types,
        } => {
            let wildcard = destination_ids.iter().any(|s| s == "*");
            let ids = parse_ids(&destination_ids);
            subs.subscribe(&ids, wildcard, event_types);
            WsMessage::new(
                msg.id,
                WsMessageType::Response,
                serde_json::json!({
                    "subscribed": ids.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "count": subs.count(),
                    "wildcard": subs.is_subscribed_all(),
                }),
            )
        }
        WsCommand::Unsubscribe { destination_ids } => {
            let ids = parse_ids(&destination_ids);
            subs.unsubscribe(&ids);
            WsMessage::new(
                msg.id,
                WsMessageType::Response,
                serde_json::json!({
                    "unsubscribed": ids.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "remaining_count": subs.count(),
                }),
            )
        }
        WsCommand::GetQueue { destination_id } => {
            let Ok(uuid) = destination_id.parse::<uuid::Uuid>() else {
                return serde_json::to_string(&WsMessage::error(msg.id, 400, "invalid destination id")).ok();
            };
            match tracker.queue(DestinationId::from_uuid(uuid)).await {
                Ok(stats) => WsMessage::new(
                    msg.id,
                    WsMessageType::Response,
                    serde_json::to_value(stats).unwrap_or_default(),
                ),
                Err(e) => WsMessage::error(msg.id, e.status_code().as_u16(), &e.to_string()),
            }
        }
    };
    serde_json::to_string(&reply).ok()
}

fn parse_ids(raw: &[String]) -> Vec<DestinationId> {
    raw.iter()
        .filter_map(|s| s.parse::<uuid::Uuid>().ok())
        .map(DestinationId::from_uuid)
        .collect()
}
