//! Tracker rules and their filter clauses.
//!
//! A [`Rule`] is an ordered list of [`Clause`]s plus exactly one
//! destination. A rule matches a killmail when every clause is satisfied;
//! within a membership clause any one value is enough. A clause without
//! configured values or bounds is inert.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{DestinationId, RuleId};
use crate::error::TrackerError;

/// Whether a membership clause requires or excludes its values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// At least one relevant entity must carry one of the values.
    Require,
    /// No relevant entity may carry any of the values.
    Exclude,
}

/// The killmail attribute a membership clause is tested against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    /// Alliance of any attacker.
    AttackerAlliance,
    /// Corporation of any attacker.
    AttackerCorporation,
    /// Character of any attacker.
    AttackerCharacter,
    /// Ship type of any attacker.
    AttackerShipType,
    /// Alliance of the victim.
    VictimAlliance,
    /// Corporation of the victim.
    VictimCorporation,
    /// Character of the victim.
    VictimCharacter,
    /// Ship type of the victim.
    VictimShipType,
    /// Solar system of the kill.
    SolarSystem,
    /// Constellation of the kill.
    Constellation,
    /// Region of the kill.
    Region,
}

impl Subject {
    /// Returns `true` if the subject ranges over every attacker.
    #[must_use]
    pub const fn is_attacker(self) -> bool {
        matches!(
            self,
            Self::AttackerAlliance
                | Self::AttackerCorporation
                | Self::AttackerCharacter
                | Self::AttackerShipType
        )
    }
}

/// One filter condition of a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Clause {
    /// Participant, ship type or location membership.
    Membership {
        /// Attribute under test.
        subject: Subject,
        /// Require or exclude.
        polarity: Polarity,
        /// Accepted (or rejected) IDs. Empty means inert.
        #[serde(default)]
        values: BTreeSet<i64>,
    },
    /// Numeric threshold on the killmail value.
    Value {
        /// Inclusive lower bound.
        #[serde(default)]
        min: Option<f64>,
        /// Inclusive upper bound.
        #[serde(default)]
        max: Option<f64>,
    },
    /// Attacker count range, a proxy for organised fleets.
    FleetSize {
        /// Inclusive minimum number of attackers.
        #[serde(default)]
        min_attackers: Option<usize>,
        /// Inclusive maximum number of attackers.
        #[serde(default)]
        max_attackers: Option<usize>,
    },
    /// Jump distance from an origin system, resolved by a route oracle.
    Proximity {
        /// Origin solar system ID.
        origin_system_id: i64,
        /// Inclusive maximum number of jumps. `None` means inert.
        #[serde(default)]
        max_jumps: Option<u32>,
    },
}

impl Clause {
    /// Returns `true` if the clause has nothing configured and therefore
    /// never rejects a record.
    #[must_use]
    pub fn is_inert(&self) -> bool {
        match self {
            Self::Membership { values, .. } => values.is_empty(),
            Self::Value { min, max } => min.is_none() && max.is_none(),
            Self::FleetSize {
                min_attackers,
                max_attackers,
            } => min_attackers.is_none() && max_attackers.is_none(),
            Self::Proximity { max_jumps, .. } => max_jumps.is_none(),
        }
    }

    /// Short discriminator used in logs.
    #[must_use]
    pub const fn kind_str(&self) -> &'static str {
        match self {
            Self::Membership { .. } => "membership",
            Self::Value { .. } => "value",
            Self::FleetSize { .. } => "fleet_size",
            Self::Proximity { .. } => "proximity",
        }
    }
}

/// A tracker rule: clauses plus the destination notified on match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Rule {
    /// Unique rule identifier.
    #[schema(value_type = uuid::Uuid)]
    pub id: RuleId,
    /// Human-readable name, used in notification payloads.
    pub name: String,
    /// Disabled rules are skipped entirely.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Destination notified when the rule matches.
    #[schema(value_type = uuid::Uuid)]
    pub destination_id: DestinationId,
    /// Set when the rule is meant to match every killmail.
    #[serde(default)]
    pub match_all: bool,
    /// Clauses, all of which must hold.
    #[serde(default)]
    pub clauses: Vec<Clause>,
}

fn default_true() -> bool {
    true
}

impl Rule {
    /// Returns `true` if every clause is inert, so the rule matches any
    /// well-formed killmail.
    #[must_use]
    pub fn is_vacuous(&self) -> bool {
        self.clauses.iter().all(Clause::is_inert)
    }

    /// Checks that the clauses are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Configuration`] if a `require` and an
    /// `exclude` clause on the same subject share a value, or if a range
    /// clause has its minimum above its maximum.
    pub fn validate(&self) -> Result<(), TrackerError> {
        for clause in &self.clauses {
            match clause {
                Clause::Value {
                    min: Some(min),
                    max: Some(max),
                } if min > max => {
                    return Err(self.config_error(format!("value range {min} > {max}")));
                }
                Clause::FleetSize {
                    min_attackers: Some(min),
                    max_attackers: Some(max),
                } if min > max => {
                    return Err(self.config_error(format!("fleet size range {min} > {max}")));
                }
                _ => {}
            }
        }

        let memberships = self.clauses.iter().filter_map(|c| match c {
            Clause::Membership {
                subject,
                polarity,
                values,
            } => Some((*subject, *polarity, values)),
            _ => None,
        });
        for (subject, polarity, values) in memberships.clone() {
            if polarity != Polarity::Require {
                continue;
            }
            let conflict = memberships.clone().any(|(s, p, other)| {
                s == subject && p == Polarity::Exclude && !values.is_disjoint(other)
            });
            if conflict {
                return Err(self.config_error(format!(
                    "{subject:?} is both required and excluded for the same values"
                )));
            }
        }
        Ok(())
    }

    fn config_error(&self, reason: String) -> TrackerError {
        TrackerError::Configuration(format!("rule {} ({}): {reason}", self.name, self.id))
    }
}
