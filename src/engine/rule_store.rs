//! Rule configuration snapshots.
//!
//! Evaluation always runs against one immutable [`RuleSnapshot`]. The
//! [`RuleStore`] builds snapshots from a destination and rule list,
//! rejecting misconfigured rules, and swaps in a fresh `Arc` on every
//! change so that an evaluation pass in progress keeps its own copy.

use std::collections::HashMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{Destination, DestinationId, Rule, RuleId};
use crate::error::TrackerError;

/// Supplier of consistent rule sets.
pub trait RuleProvider: Send + Sync + Debug {
    /// Returns the current snapshot. Callers hold it for one evaluation pass.
    fn snapshot(&self) -> Arc<RuleSnapshot>;
}

/// On-disk rule configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Delivery targets.
    #[serde(default)]
    pub destinations: Vec<Destination>,
    /// Tracker rules.
    #[serde(default)]
    pub rules: Vec<Rule>,
}

/// A rule that was left out of a snapshot, with the reason.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RejectedRule {
    /// Rejected rule.
    #[schema(value_type = uuid::Uuid)]
    pub rule_id: RuleId,
    /// Why it was rejected.
    pub reason: String,
}

/// Immutable, validated rule set.
#[derive(Debug, Clone, Default)]
pub struct RuleSnapshot {
    rules: Vec<Rule>,
    destinations: HashMap<DestinationId, Destination>,
    rejected: Vec<RejectedRule>,
    loaded_at: Option<DateTime<Utc>>,
    source: RuleConfig,
}

impl RuleSnapshot {
    /// Validates `config` into a snapshot.
    ///
    /// Rules pointing at an unknown or disabled destination, and rules with
    /// contradictory clauses, are left out and listed in
    /// [`RuleSnapshot::rejected`]. They never fail the whole load.
    #[must_use]
    pub fn build(config: RuleConfig) -> Self {
        let source = config.clone();
        let destinations: HashMap<DestinationId, Destination> = config
            .destinations
            .into_iter()
            .map(|d| (d.id, d))
            .collect();

        let mut rules = Vec::with_capacity(config.rules.len());
        let mut rejected = Vec::new();
        for rule in config.rules {
            match check_rule(&rule, &destinations) {
                Ok(()) => {
                    if rule.is_vacuous() && !rule.match_all {
                        tracing::warn!(
                            rule_id = %rule.id,
                            name = %rule.name,
                            "rule has no active clauses and matches every killmail"
                        );
                    }
                    rules.push(rule);
                }
                Err(err) => {
                    tracing::warn!(rule_id = %rule.id, error = %err, "rule skipped");
                    rejected.push(RejectedRule {
                        rule_id: rule.id,
                        reason: err.to_string(),
                    });
                }
            }
        }

        Self {
            rules,
            destinations,
            rejected,
            loaded_at: Some(Utc::now()),
            source,
        }
    }

    /// Accepted rules, in configuration order.
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Looks up a destination.
    #[must_use]
    pub fn destination(&self, id: DestinationId) -> Option<&Destination> {
        self.destinations.get(&id)
    }

    /// All configured destinations.
    pub fn destinations(&self) -> impl Iterator<Item = &Destination> {
        self.destinations.values()
    }

    /// Rules left out of this snapshot.
    #[must_use]
    pub fn rejected(&self) -> &[RejectedRule] {
        &self.rejected
    }

    /// When the snapshot was built.
    #[must_use]
    pub const fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }

    /// The configuration the snapshot was built from, rejected rules
    /// included.
    #[must_use]
    pub fn to_config(&self) -> RuleConfig {
        self.source.clone()
    }
}

fn check_rule(
    rule: &Rule,
    destinations: &HashMap<DestinationId, Destination>,
) -> Result<(), TrackerError> {
    let Some(destination) = destinations.get(&rule.destination_id) else {
        return Err(TrackerError::Configuration(format!(
            "rule {} references unknown destination {}",
            rule.id, rule.destination_id
        )));
    };
    if !destination.enabled {
        return Err(TrackerError::Configuration(format!(
            "rule {} targets disabled destination {}",
            rule.id, destination.id
        )));
    }
    rule.validate()
}

/// In-memory [`RuleProvider`] with optional file backing.
///
/// Readers only touch `current`. Every read-modify-swap holds `writer`.
#[derive(Debug, Default)]
pub struct RuleStore {
    current: RwLock<Arc<RuleSnapshot>>,
    writer: Mutex<()>,
    path: Option<PathBuf>,
}

impl RuleStore {
    /// Creates a store serving `config`.
    #[must_use]
    pub fn new(config: RuleConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(RuleSnapshot::build(config))),
            writer: Mutex::new(()),
            path: None,
        }
    }

    /// Creates a store from a JSON file and remembers the path for
    /// [`RuleStore::reload`].
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Configuration`] if the file cannot be read or
    /// parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TrackerError> {
        let path = path.as_ref().to_path_buf();
        let config = read_config(&path)?;
        Ok(Self {
            current: RwLock::new(Arc::new(RuleSnapshot::build(config))),
            writer: Mutex::new(()),
            path: Some(path),
        })
    }

    /// Replaces the configuration. Passes already holding a snapshot are not
    /// affected.
    pub fn replace(&self, config: RuleConfig) -> Arc<RuleSnapshot> {
        let _writer = self.lock_writer();
        self.install(config)
    }

    fn install(&self, config: RuleConfig) -> Arc<RuleSnapshot> {
        let snapshot = Arc::new(RuleSnapshot::build(config));
        self.swap(Arc::clone(&snapshot));
        tracing::info!(
            rules = snapshot.rules().len(),
            rejected = snapshot.rejected().len(),
            "rule snapshot replaced"
        );
        snapshot
    }

    /// Re-reads the backing file. Without a file the current snapshot is
    /// rebuilt as-is.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Configuration`] if the file cannot be read or
    /// parsed; the previous snapshot stays active.
    pub fn reload(&self) -> Result<Arc<RuleSnapshot>, TrackerError> {
        let _writer = self.lock_writer();
        let config = match &self.path {
            Some(path) => read_config(path)?,
            None => self.snapshot().to_config(),
        };
        Ok(self.install(config))
    }

    /// Enables or disables one rule.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::RuleNotFound`] if the rule is not part of the
    /// current snapshot.
    pub fn set_enabled(&self, rule_id: RuleId, enabled: bool) -> Result<Rule, TrackerError> {
        let _writer = self.lock_writer();
        let mut config = self.snapshot().to_config();
        let Some(rule) = config.rules.iter_mut().find(|r| r.id == rule_id) else {
            return Err(TrackerError::RuleNotFound(*rule_id.as_uuid()));
        };
        rule.enabled = enabled;
        let updated = rule.clone();
        self.install(config);
        Ok(updated)
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn swap(&self, snapshot: Arc<RuleSnapshot>) {
        match self.current.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }
}

impl RuleProvider for RuleStore {
    fn snapshot(&self) -> Arc<RuleSnapshot> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }
}

fn read_config(path: &Path) -> Result<RuleConfig, TrackerError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        TrackerError::Configuration(format!("cannot read {}: {e}", path.display()))
    })?;
    serde_json::from_str(&raw)
        .map_err(|e| TrackerError::Configuration(format!("cannot parse {}: {e}", path.display())))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{Clause, Polarity, RateLimit, Subject};

    fn destination(enabled: bool) -> Destination {
        Destination {
            id: DestinationId::new(),
            name: "ops".to_string(),
            url: "http://127.0.0.1:9/hook".to_string(),
            enabled,
            rate_limit: RateLimit::default(),
        }
    }

    fn rule(destination_id: DestinationId) -> Rule {
        Rule {
            id: RuleId::new(),
            name: "r".to_string(),
            enabled: true,
            destination_id,
            match_all: true,
            clauses: Vec::new(),
        }
    }

    #[test]
    fn unknown_destination_is_rejected() {
        let d = destination(true);
        let good = rule(d.id);
        let orphan = rule(DestinationId::new());
        let snapshot = RuleSnapshot::build(RuleConfig {
            destinations: vec![d],
            rules: vec![good.clone(), orphan.clone()],
        });
        assert_eq!(snapshot.rules().len(), 1);
        assert_eq!(snapshot.rules().first().map(|r| r.id), Some(good.id));
        assert_eq!(snapshot.rejected().first().map(|r| r.rule_id), Some(orphan.id));
    }

    #[test]
    fn disabled_destination_rejects_rule() {
        let d = destination(false);
        let snapshot = RuleSnapshot::build(RuleConfig {
            rules: vec![rule(d.id)],
            destinations: vec![d],
        });
        assert!(snapshot.rules().is_empty());
        assert_eq!(snapshot.rejected().len(), 1);
    }

    #[test]
    fn contradictory_rule_is_rejected() {
        let d = destination(true);
        let mut r = rule(d.id);
        r.clauses = vec![
            Clause::Membership {
                subject: Subject::VictimAlliance,
                polarity: Polarity::Require,
                values: [1].into_iter().collect(),
            },
            Clause::Membership {
                subject: Subject::VictimAlliance,
                polarity: Polarity::Exclude,
                values: [1].into_iter().collect(),
            },
        ];
        let snapshot = RuleSnapshot::build(RuleConfig {
            destinations: vec![d],
            rules: vec![r],
        });
        assert!(snapshot.rules().is_empty());
    }

    #[test]
    fn held_snapshot_survives_changes() {
        let d = destination(true);
        let r = rule(d.id);
        let store = RuleStore::new(RuleConfig {
            destinations: vec![d],
            rules: vec![r.clone()],
        });

        let before = store.snapshot();
        let Ok(updated) = store.set_enabled(r.id, false) else {
            panic!("rule should exist");
        };
        assert!(!updated.enabled);

        assert!(before.rules().iter().all(|r| r.enabled));
        assert!(store.snapshot().rules().iter().all(|r| !r.enabled));
    }

    #[test]
    fn concurrent_toggles_are_all_kept() {
        for _ in 0..20 {
            let d = destination(true);
            let rules: Vec<Rule> = (0..32).map(|_| rule(d.id)).collect();
            let ids: Vec<RuleId> = rules.iter().map(|r| r.id).collect();
            let store = RuleStore::new(RuleConfig {
                destinations: vec![d],
                rules,
            });

            std::thread::scope(|scope| {
                for id in &ids {
                    let store = &store;
                    scope.spawn(move || store.set_enabled(*id, false));
                }
            });

            let snapshot = store.snapshot();
            assert_eq!(snapshot.rules().len(), 32);
            assert!(snapshot.rules().iter().all(|r| !r.enabled));
        }
    }

    #[test]
    fn set_enabled_unknown_rule_fails() {
        let store = RuleStore::new(RuleConfig::default());
        let result = store.set_enabled(RuleId::new(), true);
        assert!(matches!(result, Err(TrackerError::RuleNotFound(_))));
    }

    #[test]
    fn from_file_and_reload() {
        let d = destination(true);
        let config = RuleConfig {
            rules: vec![rule(d.id)],
            destinations: vec![d],
        };
        let path = std::env::temp_dir().join(format!("rules-{}.json", uuid::Uuid::new_v4()));
        let Ok(json) = serde_json::to_string(&config) else {
            panic!("config serializes");
        };
        if std::fs::write(&path, json).is_err() {
            panic!("temp file writable");
        }

        let Ok(store) = RuleStore::from_file(&path) else {
            panic!("config loads");
        };
        assert_eq!(store.snapshot().rules().len(), 1);

        if std::fs::write(&path, r#"{"destinations":[],"rules":[]}"#).is_err() {
            panic!("temp file writable");
        }
        let Ok(reloaded) = store.reload() else {
            panic!("reload succeeds");
        };
        assert!(reloaded.rules().is_empty());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_file_is_configuration_error() {
        let result = RuleStore::from_file("/nonexistent/rules.json");
        assert!(matches!(result, Err(TrackerError::Configuration(_))));
    }
}
