//! Notifications waiting in a dispatch queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{DestinationId, RuleId};

/// A formatted message addressed to one destination.
///
/// Created by the rule engine on match, owned by exactly one dispatch queue
/// until it is delivered or dead-lettered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Notification {
    /// Unique notification identifier.
    pub id: uuid::Uuid,
    /// Rule that produced the notification.
    #[schema(value_type = uuid::Uuid)]
    pub rule_id: RuleId,
    /// Destination queue the notification belongs to.
    #[schema(value_type = uuid::Uuid)]
    pub destination_id: DestinationId,
    /// Killmail that matched.
    pub killmail_id: i64,
    /// Webhook body, ready to send.
    pub payload: serde_json::Value,
    /// When the notification was created.
    pub enqueued_at: DateTime<Utc>,
    /// Failed delivery attempts so far.
    pub attempts: u32,
    /// Earliest time of the next attempt, set by retry backoff.
    #[serde(default)]
    pub not_before: Option<DateTime<Utc>>,
}

impl Notification {
    /// Creates a fresh notification with zero attempts.
    #[must_use]
    pub fn new(
        rule_id: RuleId,
        destination_id: DestinationId,
        killmail_id: i64,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            rule_id,
            destination_id,
            killmail_id,
            payload,
            enqueued_at: Utc::now(),
            attempts: 0,
            not_before: None,
        }
    }

    /// Returns `true` if the notification may be attempted at `now`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.not_before.is_none_or(|t| t <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_notification_is_due() {
        let n = Notification::new(RuleId::new(), DestinationId::new(), 1, serde_json::json!({}));
        assert_eq!(n.attempts, 0);
        assert!(n.is_due(Utc::now()));
    }

    #[test]
    fn backoff_deadline_delays_due() {
        let mut n = Notification::new(RuleId::new(), DestinationId::new(), 1, serde_json::json!({}));
        let now = Utc::now();
        n.not_before = Some(now + chrono::Duration::seconds(30));
        assert!(!n.is_due(now));
        assert!(n.is_due(now + chrono::Duration::seconds(31)));
    }
}
