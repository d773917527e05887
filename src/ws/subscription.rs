//! Per-connection subscription manager.
//!
//! Tracks which destinations and event types a WebSocket client is
//! subscribed to and provides server-side event filtering.

use std::collections::HashSet;

use crate::domain::{DestinationId, TrackerEvent};

/// Manages the subscriptions of a single WebSocket connection.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    /// Subscribed destinations. Ignored while `subscribe_all` is set.
    destination_ids: HashSet<DestinationId>,
    /// Whether the client subscribes to all destinations (wildcard `"*"`).
    subscribe_all: bool,
    /// Event types to forward; `None` forwards every type.
    event_types: Option<HashSet<String>>,
}

impl SubscriptionManager {
    /// Creates a new empty subscription manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds destinations to the subscription set and replaces the event
    /// type filter when one is given.
    pub fn subscribe(&mut self, ids: &[DestinationId], wildcard: bool, event_types: Option<Vec<String>>) {
        if wildcard {
            self.subscribe_all = true;
        }
        self.destination_ids.extend(ids.iter().copied());
        if let Some(types) = event_types {
            self.event_types = Some(types.into_iter().collect());
        }
    }

    /// Removes destinations from the subscription set.
    pub fn unsubscribe(&mut self, ids: &[DestinationId]) {
        for id in ids {
            self.destination_ids.remove(id);
        }
    }

    /// Returns `true` if `event` passes the subscription filter.
    #[must_use]
    pub fn matches(&self, event: &TrackerEvent) -> bool {
        let destination_ok = self.subscribe_all || self.destination_ids.contains(&event.destination_id());
        let type_ok = self
            .event_types
            .as_ref()
            .is_none_or(|types| types.contains(event.event_type_str()));
        destination_ok && type_ok
    }

    /// Returns the number of explicitly subscribed destinations.
    #[must_use]
    pub fn count(&self) -> usize {
        self.destination_ids.len()
    }

    /// Returns `true` if the wildcard subscription is active.
    #[must_use]
    pub fn is_subscribed_all(&self) -> bool {
        self.subscribe_all
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::WorkerState;

    fn purged(destination_id: DestinationId) -> TrackerEvent {
        TrackerEvent::QueuePurged {
            destination_id,
            purged: 1,
            timestamp: Utc::now(),
        }
    }

    fn idle(destination_id: DestinationId) -> TrackerEvent {
        TrackerEvent::WorkerStateChanged {
            destination_id,
            state: WorkerState::Idle,
            queue_depth: 0,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn empty_matches_nothing() {
        let mgr = SubscriptionManager::new();
        assert!(!mgr.matches(&purged(DestinationId::new())));
    }

    #[test]
    fn subscribe_specific_destination() {
        let mut mgr = SubscriptionManager::new();
        let id = DestinationId::new();
        mgr.subscribe(&[id], false, None);
        assert!(mgr.matches(&purged(id)));
        assert!(!mgr.matches(&purged(DestinationId::new())));
    }

    #[test]
    fn wildcard_matches_everything() {
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(&[], true, None);
        assert!(mgr.matches(&purged(DestinationId::new())));
        assert!(mgr.is_subscribed_all());
    }

    #[test]
    fn event_type_filter() {
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(&[], true, Some(vec!["queue_purged".to_string()]));
        let id = DestinationId::new();
        assert!(mgr.matches(&purged(id)));
        assert!(!mgr.matches(&idle(id)));
    }

    #[test]
    fn unsubscribe_removes_destination() {
        let mut mgr = SubscriptionManager::new();
        let id = DestinationId::new();
        mgr.subscribe(&[id, DestinationId::new()], false, None);
        assert_eq!(mgr.count(), 2);
        mgr.unsubscribe(&[id]);
        assert!(!mgr.matches(&purged(id)));
        assert_eq!(mgr.count(), 1);
    }
}
