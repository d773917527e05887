//! Service layer: business logic orchestration.
//!
//! [`TrackerService`] evaluates incoming killmails against the current rule
//! snapshot and routes the resulting notifications to the dispatcher.

pub mod tracker_service;

pub use tracker_service::{IngestReport, MatchedRoute, TrackerService};
