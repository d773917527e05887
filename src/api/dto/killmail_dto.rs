//! Killmail ingestion DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::RawKillmail;
use crate::service::IngestReport;

/// Request body for `POST /killmails`: one killmail or a batch.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum IngestRequest {
    /// Several killmails, evaluated independently.
    Batch(Vec<RawKillmail>),
    /// A single killmail.
    Single(Box<RawKillmail>),
}

/// A batch entry that failed validation.
#[derive(Debug, Serialize, ToSchema)]
pub struct RejectedRecord {
    /// Position in the request batch.
    pub index: usize,
    /// Killmail ID, as sent.
    pub killmail_id: i64,
    /// Validation failure.
    pub message: String,
}

/// Response body for a batch ingest.
#[derive(Debug, Serialize, ToSchema)]
pub struct BatchIngestResponse {
    /// Killmails evaluated, in request order.
    pub accepted: Vec<IngestReport>,
    /// Killmails rejected as malformed.
    pub rejected: Vec<RejectedRecord>,
}
