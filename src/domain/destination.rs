//! Delivery targets.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::DestinationId;

/// Maximum number of deliveries per rolling time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RateLimit {
    /// Deliveries allowed per window.
    pub max_items: u32,
    /// Window length in seconds.
    pub window_secs: u64,
}

impl Default for RateLimit {
    /// Discord's documented webhook limit: 30 requests per minute.
    fn default() -> Self {
        Self {
            max_items: 30,
            window_secs: 60,
        }
    }
}

/// A webhook endpoint notified by one or more rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Destination {
    /// Unique destination identifier.
    #[schema(value_type = uuid::Uuid)]
    pub id: DestinationId,
    /// Human-readable name.
    pub name: String,
    /// Webhook URL.
    pub url: String,
    /// Rules targeting a disabled destination are skipped at load time.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Outbound rate limit.
    #[serde(default)]
    pub rate_limit: RateLimit,
}

fn default_true() -> bool {
    true
}
