//! Rule administration handlers: list, reload, enable/disable.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router};

use crate::api::dto::{RuleSetResponse, UpdateRuleRequest};
use crate::app_state::AppState;
use crate::domain::{Rule, RuleId};
use crate::engine::RuleProvider;
use crate::error::{ErrorResponse, TrackerError};

/// `GET /rules` — The active rule snapshot.
#[utoipa::path(
    get,
    path = "/api/v1/rules",
    tag = "Rules",
    summary = "List rules",
    description = "Returns the active rules and destinations, plus any rules rejected at load time.",
    responses(
        (status = 200, description = "Active rule set", body = RuleSetResponse),
    )
)]
pub async fn list_rules(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.tracker.rules().snapshot();
    Json(RuleSetResponse::from(snapshot.as_ref()))
}

/// `POST /rules/reload` — Re-read the rule file.
///
/// # Errors
///
/// Returns [`TrackerError::Configuration`] if the file cannot be read or
/// parsed. The previous rules stay active.
#[utoipa::path(
    post,
    path = "/api/v1/rules/reload",
    tag = "Rules",
    summary = "Reload rules",
    description = "Re-reads the rule file and swaps in a new snapshot. Evaluations in progress finish on the old one.",
    responses(
        (status = 200, description = "Reloaded rule set", body = RuleSetResponse),
        (status = 422, description = "Unreadable rule file", body = ErrorResponse),
    )
)]
pub async fn reload_rules(State(state): State<AppState>) -> Result<impl IntoResponse, TrackerError> {
    let snapshot = state.tracker.reload_rules().await?;
    Ok(Json(RuleSetResponse::from(snapshot.as_ref())))
}

/// `PATCH /rules/{id}` — Enable or disable one rule.
///
/// # Errors
///
/// Returns [`TrackerError::RuleNotFound`] for an unknown rule.
#[utoipa::path(
    patch,
    path = "/api/v1/rules/{id}",
    tag = "Rules",
    summary = "Enable or disable a rule",
    params(
        ("id" = uuid::Uuid, Path, description = "Rule UUID"),
    ),
    request_body = UpdateRuleRequest,
    responses(
        (status = 200, description = "Updated rule", body = Rule),
        (status = 404, description = "Rule not found", body = ErrorResponse),
    )
)]
pub async fn update_rule(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    Json(req): Json<UpdateRuleRequest>,
) -> Result<impl IntoResponse, TrackerError> {
    let rule = state
        .tracker
        .set_rule_enabled(RuleId::from_uuid(id), req.enabled)?;
    Ok(Json(rule))
}

/// Rule routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/rules", get(list_rules))
        .route("/rules/reload", post(reload_rules))
        .route("/rules/{id}", patch(update_rule))
}
