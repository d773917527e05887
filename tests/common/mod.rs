//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeSet, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use futures_util::future::BoxFuture;
use serde_json::{Value, json};

use killtracker_gateway::app_state::AppState;
use killtracker_gateway::config::TrackerConfig;
use killtracker_gateway::delivery::{DeadLetterLog, DeliveryError, Transport};
use killtracker_gateway::domain::{
    Attacker, Clause, Destination, DestinationId, Location, Notification, Participant, Polarity,
    RateLimit, RawKillmail, Rule, RuleId, Subject,
};
use killtracker_gateway::engine::{NoRoutes, RuleConfig, RuleStore};

/// Transport recording every delivery. Scripted failures are returned first.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    failures: Mutex<VecDeque<DeliveryError>>,
    fail_forever: Option<DeliveryError>,
    delivered: Mutex<Vec<Notification>>,
    calls: AtomicUsize,
}

impl RecordingTransport {
    /// Fails with `failures` in order, then succeeds.
    pub fn scripted(failures: Vec<DeliveryError>) -> Self {
        Self {
            failures: Mutex::new(failures.into()),
            ..Self::default()
        }
    }

    /// Fails every attempt with `error`.
    pub fn failing(error: DeliveryError) -> Self {
        Self {
            fail_forever: Some(error),
            ..Self::default()
        }
    }

    /// Successfully delivered notifications, in delivery order.
    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Killmail IDs delivered to `destination_id`, in delivery order.
    pub fn delivered_to(&self, destination_id: DestinationId) -> Vec<i64> {
        self.delivered()
            .iter()
            .filter(|n| n.destination_id == destination_id)
            .map(|n| n.killmail_id)
            .collect()
    }

    /// Number of attempts made, successful or not.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transport for RecordingTransport {
    fn deliver<'a>(
        &'a self,
        _destination: &'a Destination,
        notification: &'a Notification,
    ) -> BoxFuture<'a, Result<(), DeliveryError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(error) = &self.fail_forever {
                return Err(error.clone());
            }
            let scripted = self
                .failures
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            if let Some(error) = scripted {
                return Err(error);
            }
            self.delivered
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(notification.clone());
            Ok(())
        })
    }
}

/// A transient failure.
pub fn transient(reason: &str) -> DeliveryError {
    DeliveryError::Transient {
        reason: reason.to_string(),
        retry_after: None,
    }
}

/// A permanent failure.
pub fn permanent(reason: &str) -> DeliveryError {
    DeliveryError::Permanent {
        reason: reason.to_string(),
    }
}

/// An enabled destination with the default rate limit.
pub fn destination(name: &str) -> Destination {
    Destination {
        id: DestinationId::new(),
        name: name.to_string(),
        url: format!("http://127.0.0.1:9/{name}"),
        enabled: true,
        rate_limit: RateLimit::default(),
    }
}

/// A destination allowing a single delivery per hour.
pub fn throttled_destination(name: &str) -> Destination {
    Destination {
        rate_limit: RateLimit {
            max_items: 1,
            window_secs: 3600,
        },
        ..destination(name)
    }
}

/// A rule matching victims of `corporation_id`.
pub fn corp_rule(destination_id: DestinationId, corporation_id: i64) -> Rule {
    Rule {
        id: RuleId::new(),
        name: format!("corp {corporation_id} losses"),
        enabled: true,
        destination_id,
        match_all: false,
        clauses: vec![Clause::Membership {
            subject: Subject::VictimCorporation,
            polarity: Polarity::Require,
            values: BTreeSet::from([corporation_id]),
        }],
    }
}

/// A well-formed killmail whose victim belongs to `victim_corporation`.
pub fn raw_killmail(killmail_id: i64, victim_corporation: i64) -> RawKillmail {
    RawKillmail {
        killmail_id,
        killmail_time: Utc::now(),
        location: Location {
            solar_system_id: 30_002_187,
            constellation_id: Some(20_000_320),
            region_id: Some(10_000_043),
        },
        total_value: 250_000_000.0,
        victim: Some(Participant {
            character_id: Some(90_000_001),
            corporation_id: Some(victim_corporation),
            alliance_id: None,
            ship_type_id: Some(24_690),
        }),
        attackers: vec![Attacker {
            participant: Participant {
                character_id: Some(90_000_002),
                corporation_id: Some(98_000_002),
                alliance_id: Some(99_000_002),
                ship_type_id: Some(17_738),
            },
            final_blow: true,
        }],
    }
}

/// JSON wire form of [`raw_killmail`].
pub fn killmail_json(killmail_id: i64, victim_corporation: i64) -> Value {
    json!({
        "killmail_id": killmail_id,
        "killmail_time": "2026-03-01T18:30:00Z",
        "location": { "solar_system_id": 30_002_187, "region_id": 10_000_043 },
        "total_value": 250_000_000.0,
        "victim": { "character_id": 90_000_001, "corporation_id": victim_corporation, "ship_type_id": 24_690 },
        "attackers": [
            { "character_id": 90_000_002, "corporation_id": 98_000_002, "ship_type_id": 17_738, "final_blow": true }
        ]
    })
}

/// Configuration with immediate retries.
pub fn fast_config() -> TrackerConfig {
    TrackerConfig {
        delivery_base_delay_ms: 0,
        delivery_max_delay_ms: 0,
        delivery_poll_interval_ms: 20,
        delivery_timeout_secs: 5,
        ..TrackerConfig::default()
    }
}

/// Application state over `rules` and `transport`.
pub fn state_with(config: &TrackerConfig, rules: RuleConfig, transport: Arc<dyn Transport>) -> AppState {
    AppState::new(
        config,
        RuleStore::new(rules),
        Arc::new(NoRoutes),
        transport,
        Arc::new(DeadLetterLog::new(config.dead_letter_capacity)),
    )
}

/// Polls `condition` every 10ms for up to five seconds.
pub async fn eventually<F, Fut>(mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..500 {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
