//! REST endpoint handlers organized by resource.

pub mod dead_letters;
pub mod killmails;
pub mod queues;
pub mod rules;
pub mod system;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(killmails::routes())
        .merge(queues::routes())
        .merge(rules::routes())
        .merge(dead_letters::routes())
        .merge(system::api_routes())
}
