//! HTTP API tests driving the router in-process.

#![allow(clippy::panic, clippy::indexing_slicing)]

mod common;

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use common::{
    RecordingTransport, corp_rule, destination, eventually, fast_config, killmail_json, permanent,
    state_with, throttled_destination,
};
use killtracker_gateway::api;
use killtracker_gateway::app_state::AppState;
use killtracker_gateway::delivery::Transport;
use killtracker_gateway::domain::{Destination, Rule};
use killtracker_gateway::engine::RuleConfig;

struct Fixture {
    state: AppState,
    destination: Destination,
    rule: Rule,
}

impl Fixture {
    fn new(destination: Destination, transport: Arc<dyn Transport>) -> Self {
        let rule = corp_rule(destination.id, 10);
        let rules = RuleConfig {
            destinations: vec![destination.clone()],
            rules: vec![rule.clone()],
        };
        Self {
            state: state_with(&fast_config(), rules, transport),
            destination,
            rule,
        }
    }

    fn app(&self) -> Router {
        api::app(self.state.clone())
    }
}

async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    };
    let Ok(request) = request else {
        panic!("invalid request for {uri}");
    };
    let Ok(response) = app.oneshot(request).await else {
        panic!("router failed on {uri}");
    };
    let status = response.status();
    let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
        panic!("unreadable body for {uri}");
    };
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn health_reports_rules_and_status() {
    let fx = Fixture::new(destination("intel"), Arc::new(RecordingTransport::default()));
    let (status, body) = send(fx.app(), Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["rules"], 1);
}

#[tokio::test]
async fn health_is_unavailable_during_shutdown() {
    let fx = Fixture::new(destination("intel"), Arc::new(RecordingTransport::default()));
    fx.state.tracker.dispatcher().shutdown().await;
    let (status, body) = send(fx.app(), Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "shutting_down");
}

#[tokio::test]
async fn single_killmail_is_accepted() {
    let fx = Fixture::new(destination("intel"), Arc::new(RecordingTransport::default()));
    let (status, body) = send(
        fx.app(),
        Method::POST,
        "/api/v1/killmails",
        Some(killmail_json(42, 10)),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["killmail_id"], 42);
    assert_eq!(body["matches"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["matches"][0]["rule_id"], json!(fx.rule.id.as_uuid()));
    fx.state.tracker.dispatcher().shutdown().await;
}

#[tokio::test]
async fn batch_reports_rejected_entries() {
    let fx = Fixture::new(destination("intel"), Arc::new(RecordingTransport::default()));
    let mut missing_victim = killmail_json(2, 10);
    if let Some(obj) = missing_victim.as_object_mut() {
        obj.remove("victim");
    }
    let batch = json!([killmail_json(1, 10), missing_victim, killmail_json(3, 20)]);

    let (status, body) = send(fx.app(), Method::POST, "/api/v1/killmails", Some(batch)).await;
    assert_eq!(status, StatusCode::MULTI_STATUS);
    assert_eq!(body["accepted"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["rejected"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["rejected"][0]["index"], 1);
    assert_eq!(body["rejected"][0]["killmail_id"], 2);
    assert_eq!(body["accepted"][1]["matches"].as_array().map(Vec::len), Some(0));
    fx.state.tracker.dispatcher().shutdown().await;
}

#[tokio::test]
async fn malformed_killmail_is_bad_request() {
    let fx = Fixture::new(destination("intel"), Arc::new(RecordingTransport::default()));
    let mut no_attackers = killmail_json(5, 10);
    no_attackers["attackers"] = json!([]);

    let (status, body) = send(fx.app(), Method::POST, "/api/v1/killmails", Some(no_attackers)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], 1001);
}

#[tokio::test]
async fn queues_expose_depth_and_purge() {
    let fx = Fixture::new(throttled_destination("intel"), Arc::new(RecordingTransport::default()));
    for id in 1..=3 {
        let (status, _) = send(
            fx.app(),
            Method::POST,
            "/api/v1/killmails",
            Some(killmail_json(id, 10)),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }
    let uri = format!("/api/v1/queues/{}", fx.destination.id.as_uuid());
    let tracker = &*fx.state.tracker;
    let id = fx.destination.id;
    assert!(eventually(|| async move { tracker.queue(id).await.map(|s| s.depth).ok() == Some(2) }).await);

    let (status, body) = send(fx.app(), Method::GET, "/api/v1/queues", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_depth"], 2);

    let (status, body) = send(fx.app(), Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["depth"], 2);

    let (status, body) = send(fx.app(), Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["purged"], 2);

    let (_, body) = send(fx.app(), Method::GET, &uri, None).await;
    assert_eq!(body["depth"], 0);
    fx.state.tracker.dispatcher().shutdown().await;
}

#[tokio::test]
async fn unknown_queue_is_not_found() {
    let fx = Fixture::new(destination("intel"), Arc::new(RecordingTransport::default()));
    let uri = format!("/api/v1/queues/{}", uuid::Uuid::new_v4());
    let (status, _) = send(fx.app(), Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(fx.app(), Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn disabling_a_rule_stops_matches() {
    let fx = Fixture::new(destination("intel"), Arc::new(RecordingTransport::default()));

    let (status, body) = send(fx.app(), Method::GET, "/api/v1/rules", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rules"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["destinations"].as_array().map(Vec::len), Some(1));

    let uri = format!("/api/v1/rules/{}", fx.rule.id.as_uuid());
    let (status, body) = send(fx.app(), Method::PATCH, &uri, Some(json!({ "enabled": false }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["enabled"], false);

    let (status, body) = send(
        fx.app(),
        Method::POST,
        "/api/v1/killmails",
        Some(killmail_json(77, 10)),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["matches"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn patching_an_unknown_rule_is_not_found() {
    let fx = Fixture::new(destination("intel"), Arc::new(RecordingTransport::default()));
    let uri = format!("/api/v1/rules/{}", uuid::Uuid::new_v4());
    let (status, body) = send(fx.app(), Method::PATCH, &uri, Some(json!({ "enabled": true }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], 2001);
}

#[tokio::test]
async fn reload_without_file_keeps_rules() {
    let fx = Fixture::new(destination("intel"), Arc::new(RecordingTransport::default()));
    let (status, body) = send(fx.app(), Method::POST, "/api/v1/rules/reload", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rules"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn dead_letters_are_listed_with_metrics() {
    let fx = Fixture::new(
        destination("intel"),
        Arc::new(RecordingTransport::failing(permanent("410 Gone"))),
    );
    let (status, _) = send(
        fx.app(),
        Method::POST,
        "/api/v1/killmails",
        Some(killmail_json(99, 10)),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let dead_letters = &*fx.state.dead_letters;
    assert!(eventually(|| async move { dead_letters.len() == 1 }).await);

    let (status, body) = send(fx.app(), Method::GET, "/api/v1/dead-letters", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["reason"], "410 Gone");
    assert_eq!(body["data"][0]["permanent"], true);
    assert_eq!(body["data"][0]["notification"]["killmail_id"], 99);
    assert_eq!(body["pagination"]["total"], 1);

    let (status, body) = send(fx.app(), Method::GET, "/api/v1/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["counters"]["matched"], 1);
    assert_eq!(body["counters"]["dead_lettered"], 1);
    assert_eq!(body["dead_letters_retained"], 1);
    fx.state.tracker.dispatcher().shutdown().await;
}

#[tokio::test]
async fn empty_batch_is_rejected() {
    let fx = Fixture::new(destination("intel"), Arc::new(RecordingTransport::default()));
    let (status, body) = send(fx.app(), Method::POST, "/api/v1/killmails", Some(json!([]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], 1002);
}
