//! Rule administration DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{Destination, Rule};
use crate::engine::{RejectedRule, RuleSnapshot};

/// Active rule set, returned by `GET /rules` and `POST /rules/reload`.
#[derive(Debug, Serialize, ToSchema)]
pub struct RuleSetResponse {
    /// Rules accepted into the active snapshot.
    pub rules: Vec<Rule>,
    /// Configured destinations.
    pub destinations: Vec<Destination>,
    /// Rules left out of the snapshot, with reasons.
    pub rejected: Vec<RejectedRule>,
    /// When the snapshot was built.
    pub loaded_at: Option<DateTime<Utc>>,
}

impl From<&RuleSnapshot> for RuleSetResponse {
    fn from(snapshot: &RuleSnapshot) -> Self {
        let mut destinations: Vec<Destination> = snapshot.destinations().cloned().collect();
        destinations.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Self {
            rules: snapshot.rules().to_vec(),
            destinations,
            rejected: snapshot.rejected().to_vec(),
            loaded_at: snapshot.loaded_at(),
        }
    }
}

/// Request body for `PATCH /rules/{id}`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRuleRequest {
    /// New enabled flag.
    pub enabled: bool,
}
