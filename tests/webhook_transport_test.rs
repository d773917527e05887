//! Webhook transport against a local HTTP server.

#![allow(clippy::panic)]

mod common;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio_test::{assert_err, assert_ok};

use common::{corp_rule, destination, eventually, fast_config, raw_killmail, state_with};
use killtracker_gateway::delivery::transport::MAX_RETRY_AFTER;
use killtracker_gateway::delivery::{DeliveryError, Transport, WebhookTransport};
use killtracker_gateway::domain::{Destination, Notification, RuleId};
use killtracker_gateway::engine::RuleConfig;

type Received = Arc<Mutex<Vec<Value>>>;

async fn capture(State(received): State<Received>, Json(body): Json<Value>) -> StatusCode {
    received
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(body);
    StatusCode::NO_CONTENT
}

async fn slow_down() -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    headers.insert(header::RETRY_AFTER, header::HeaderValue::from_static("7"));
    (StatusCode::TOO_MANY_REQUESTS, headers)
}

fn back_off_forever() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::RETRY_AFTER, header::HeaderValue::from_static("1e30"));
    headers
}

/// Answers the first request with 429 and an absurd `Retry-After`, then 204.
async fn throttle_once(State(hits): State<Arc<AtomicUsize>>) -> impl IntoResponse {
    if hits.fetch_add(1, Ordering::SeqCst) == 0 {
        (StatusCode::TOO_MANY_REQUESTS, back_off_forever())
    } else {
        (StatusCode::NO_CONTENT, HeaderMap::new())
    }
}

async fn bind(app: Router) -> SocketAddr {
    let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
        panic!("cannot bind test server");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("no local address");
    };
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

async fn spawn_server() -> (SocketAddr, Received) {
    let received: Received = Arc::default();
    let app = Router::new()
        .route("/capture", post(capture))
        .route("/slow-down", post(slow_down))
        .route("/broken", post(|| async { StatusCode::BAD_GATEWAY }))
        .route("/gone", post(|| async { StatusCode::NOT_FOUND }))
        .route(
            "/back-off-forever",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, back_off_forever()) }),
        )
        .with_state(Arc::clone(&received));
    (bind(app).await, received)
}

fn target(addr: SocketAddr, path: &str) -> Destination {
    Destination {
        url: format!("http://{addr}{path}"),
        ..destination("hook")
    }
}

fn notification(dest: &Destination) -> Notification {
    Notification::new(RuleId::new(), dest.id, 555, json!({ "content": "kill 555" }))
}

fn transport() -> WebhookTransport {
    let Ok(transport) = WebhookTransport::new(Duration::from_secs(5)) else {
        panic!("http client should build");
    };
    transport
}

#[tokio::test]
async fn posts_the_payload_as_json() {
    let (addr, received) = spawn_server().await;
    let dest = target(addr, "/capture");

    assert_ok!(transport().deliver(&dest, &notification(&dest)).await);
    let bodies = received.lock().unwrap_or_else(PoisonError::into_inner).clone();
    assert_eq!(bodies, vec![json!({ "content": "kill 555" })]);
}

#[tokio::test]
async fn too_many_requests_is_transient_with_retry_after() {
    let (addr, _) = spawn_server().await;
    let dest = target(addr, "/slow-down");

    let err = assert_err!(transport().deliver(&dest, &notification(&dest)).await);
    assert!(err.is_transient());
    assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
}

#[tokio::test]
async fn server_error_is_transient() {
    let (addr, _) = spawn_server().await;
    let dest = target(addr, "/broken");

    let err = assert_err!(transport().deliver(&dest, &notification(&dest)).await);
    assert!(err.is_transient());
    assert_eq!(err.retry_after(), None);
}

#[tokio::test]
async fn client_error_is_permanent() {
    let (addr, _) = spawn_server().await;
    let dest = target(addr, "/gone");

    let result = transport().deliver(&dest, &notification(&dest)).await;
    assert!(matches!(result, Err(DeliveryError::Permanent { .. })));
}

#[tokio::test]
async fn unreachable_host_is_transient() {
    let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
        panic!("cannot bind");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("no local address");
    };
    drop(listener);
    let dest = target(addr, "/capture");

    let err = assert_err!(transport().deliver(&dest, &notification(&dest)).await);
    assert!(err.is_transient());
}

#[tokio::test]
async fn malformed_url_is_permanent() {
    let dest = Destination {
        url: "not a url".to_string(),
        ..destination("broken")
    };
    let result = transport().deliver(&dest, &notification(&dest)).await;
    assert!(matches!(result, Err(DeliveryError::Permanent { .. })));
}

#[tokio::test]
async fn absurd_retry_after_is_clamped() {
    let (addr, _) = spawn_server().await;
    let dest = target(addr, "/back-off-forever");
    let transport = transport();

    let joined = tokio::spawn(async move { transport.deliver(&dest, &notification(&dest)).await }).await;

    let Ok(result) = joined else {
        panic!("delivery task panicked");
    };
    let err = assert_err!(result);
    assert!(err.is_transient());
    assert_eq!(err.retry_after(), Some(MAX_RETRY_AFTER));
}

#[tokio::test]
async fn absurd_retry_after_holds_the_queue_without_losing_items() {
    let hits = Arc::new(AtomicUsize::new(0));
    let addr = bind(
        Router::new()
            .route("/hook", post(throttle_once))
            .with_state(Arc::clone(&hits)),
    )
    .await;
    let dest = target(addr, "/hook");
    let state = state_with(
        &fast_config(),
        RuleConfig {
            rules: vec![corp_rule(dest.id, 10)],
            destinations: vec![dest.clone()],
        },
        Arc::new(transport()),
    );
    state.tracker.start_workers().await;

    assert_ok!(state.tracker.ingest(raw_killmail(1, 10)).await);
    let counter = &*hits;
    assert!(eventually(|| async move { counter.load(Ordering::SeqCst) == 1 }).await);
    assert_ok!(state.tracker.ingest(raw_killmail(2, 10)).await);

    let tracker = &state.tracker;
    let dest_id = dest.id;
    assert!(
        eventually(|| async move {
            tracker.queue(dest_id).await.is_ok_and(|stats| stats.depth == 2)
        })
        .await
    );
    assert_eq!(state.tracker.dispatcher().worker_count().await, 1);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    state.tracker.dispatcher().shutdown().await;
}
