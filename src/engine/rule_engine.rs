//! Rule evaluation.
//!
//! [`RuleEngine::evaluate`] checks one killmail against a rule slice and
//! returns one [`Notification`] per matching enabled rule. It does not
//! enqueue anything: the caller routes the notifications to the dispatch
//! queues.

use std::sync::Arc;

use chrono::Utc;

use super::formatter::PayloadFormatter;
use super::route::RouteOracle;
use crate::domain::{Clause, Killmail, Notification, Polarity, RawKillmail, Rule, Subject, TrackerEvent};
use crate::error::TrackerError;
use crate::telemetry::Observer;

/// Evaluates killmails against tracker rules.
#[derive(Debug, Clone)]
pub struct RuleEngine {
    formatter: PayloadFormatter,
    routes: Arc<dyn RouteOracle>,
    observer: Arc<dyn Observer>,
}

impl RuleEngine {
    /// Creates an engine.
    #[must_use]
    pub fn new(
        formatter: PayloadFormatter,
        routes: Arc<dyn RouteOracle>,
        observer: Arc<dyn Observer>,
    ) -> Self {
        Self {
            formatter,
            routes,
            observer,
        }
    }

    /// Returns one notification per enabled rule matching `record`, in rule
    /// order.
    #[must_use]
    pub fn evaluate(&self, record: &Killmail, rules: &[Rule]) -> Vec<Notification> {
        rules
            .iter()
            .filter(|rule| rule.enabled && self.matches(record, rule))
            .map(|rule| {
                self.observer.observe(TrackerEvent::KillmailMatched {
                    rule_id: rule.id,
                    destination_id: rule.destination_id,
                    killmail_id: record.id(),
                    timestamp: Utc::now(),
                });
                Notification::new(
                    rule.id,
                    rule.destination_id,
                    record.id(),
                    self.formatter.format(record, rule),
                )
            })
            .collect()
    }

    /// Validates a raw record, then evaluates it.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::InvalidRecord`] if the record has no victim,
    /// no attackers or an invalid value.
    pub fn evaluate_raw(
        &self,
        record: RawKillmail,
        rules: &[Rule],
    ) -> Result<Vec<Notification>, TrackerError> {
        let killmail = Killmail::try_from(record)?;
        Ok(self.evaluate(&killmail, rules))
    }

    /// Evaluates a batch of raw records. A malformed record yields an error
    /// in its own slot and does not affect the others.
    #[must_use]
    pub fn evaluate_batch(
        &self,
        records: Vec<RawKillmail>,
        rules: &[Rule],
    ) -> Vec<Result<Vec<Notification>, TrackerError>> {
        records
            .into_iter()
            .map(|record| {
                let result = self.evaluate_raw(record, rules);
                if let Err(err) = &result {
                    tracing::warn!(error = %err, "skipping malformed killmail");
                }
                result
            })
            .collect()
    }

    /// Returns `true` if every clause of `rule` holds for `record`.
    #[must_use]
    pub fn matches(&self, record: &Killmail, rule: &Rule) -> bool {
        rule.clauses.iter().all(|clause| {
            let satisfied = self.clause_holds(record, clause);
            if !satisfied {
                tracing::trace!(
                    rule_id = %rule.id,
                    killmail_id = record.id(),
                    clause = clause.kind_str(),
                    "clause not satisfied"
                );
            }
            satisfied
        })
    }

    fn clause_holds(&self, record: &Killmail, clause: &Clause) -> bool {
        if clause.is_inert() {
            return true;
        }
        match clause {
            Clause::Membership {
                subject,
                polarity,
                values,
            } => {
                let hit = subject_values(record, *subject)
                    .into_iter()
                    .flatten()
                    .any(|v| values.contains(&v));
                match polarity {
                    Polarity::Require => hit,
                    Polarity::Exclude => !hit,
                }
            }
            Clause::Value { min, max } => {
                let value = record.value();
                min.is_none_or(|m| value >= m) && max.is_none_or(|m| value <= m)
            }
            Clause::FleetSize {
                min_attackers,
                max_attackers,
            } => {
                let count = record.attackers().len();
                min_attackers.is_none_or(|m| count >= m) && max_attackers.is_none_or(|m| count <= m)
            }
            Clause::Proximity {
                origin_system_id,
                max_jumps,
            } => max_jumps.is_none_or(|max| {
                self.routes
                    .jumps(*origin_system_id, record.location().solar_system_id)
                    .is_some_and(|jumps| jumps <= max)
            }),
        }
    }
}

/// Collects the attribute values a membership subject ranges over.
fn subject_values(record: &Killmail, subject: Subject) -> Vec<Option<i64>> {
    let victim = record.victim();
    let location = record.location();
    let attackers = record.attackers().iter().map(|a| &a.participant);
    match subject {
        Subject::AttackerAlliance => attackers.map(|p| p.alliance_id).collect(),
        Subject::AttackerCorporation => attackers.map(|p| p.corporation_id).collect(),
        Subject::AttackerCharacter => attackers.map(|p| p.character_id).collect(),
        Subject::AttackerShipType => attackers.map(|p| p.ship_type_id).collect(),
        Subject::VictimAlliance => vec![victim.alliance_id],
        Subject::VictimCorporation => vec![victim.corporation_id],
        Subject::VictimCharacter => vec![victim.character_id],
        Subject::VictimShipType => vec![victim.ship_type_id],
        Subject::SolarSystem => vec![Some(location.solar_system_id)],
        Subject::Constellation => vec![location.constellation_id],
        Subject::Region => vec![location.region_id],
    }
}
