//! Killmail records as evaluated by the rule engine.
//!
//! A [`RawKillmail`] is the wire form accepted from the ingestion side: every
//! field the tracker cares about is optional so that a malformed record can
//! still be parsed and rejected with a precise reason. [`Killmail`] is the
//! validated, read-only form: it always has a victim and at least one
//! attacker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::TrackerError;

/// One character, NPC or structure taking part in a kill.
///
/// Every attribute is optional because NPCs carry no character, corporation
/// or alliance, and structures may report no ship type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Participant {
    /// Character ID, absent for NPCs.
    #[serde(default)]
    pub character_id: Option<i64>,
    /// Corporation ID.
    #[serde(default)]
    pub corporation_id: Option<i64>,
    /// Alliance ID.
    #[serde(default)]
    pub alliance_id: Option<i64>,
    /// Ship type ID.
    #[serde(default)]
    pub ship_type_id: Option<i64>,
}

/// An attacker: a [`Participant`] plus whether it landed the final blow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Attacker {
    /// Attacker identity.
    #[serde(flatten)]
    pub participant: Participant,
    /// `true` for the attacker credited with the final blow.
    #[serde(default)]
    pub final_blow: bool,
}

/// Where a kill happened.
///
/// Constellation and region are opaque IDs looked up by the ingestion side;
/// the tracker only compares them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Location {
    /// Solar system ID.
    pub solar_system_id: i64,
    /// Constellation ID, when known.
    #[serde(default)]
    pub constellation_id: Option<i64>,
    /// Region ID, when known.
    #[serde(default)]
    pub region_id: Option<i64>,
}

/// Unvalidated killmail as received from ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RawKillmail {
    /// Killmail ID.
    pub killmail_id: i64,
    /// Time of the kill.
    pub killmail_time: DateTime<Utc>,
    /// Location of the kill.
    pub location: Location,
    /// Estimated ISK value.
    #[serde(default)]
    pub total_value: f64,
    /// Victim, required.
    #[serde(default)]
    pub victim: Option<Participant>,
    /// Attackers in the order reported by the source, at least one required.
    #[serde(default)]
    pub attackers: Vec<Attacker>,
}

/// Validated, immutable killmail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Killmail {
    id: i64,
    time: DateTime<Utc>,
    location: Location,
    value: f64,
    victim: Participant,
    attackers: Vec<Attacker>,
}

impl Killmail {
    /// Builds a killmail, enforcing the victim and attacker invariants.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::InvalidRecord`] if `attackers` is empty or
    /// `value` is negative or not finite.
    pub fn new(
        id: i64,
        time: DateTime<Utc>,
        location: Location,
        value: f64,
        victim: Participant,
        attackers: Vec<Attacker>,
    ) -> Result<Self, TrackerError> {
        if attackers.is_empty() {
            return Err(TrackerError::InvalidRecord(format!(
                "killmail {id} has no attackers"
            )));
        }
        if !value.is_finite() || value < 0.0 {
            return Err(TrackerError::InvalidRecord(format!(
                "killmail {id} has invalid value {value}"
            )));
        }
        Ok(Self {
            id,
            time,
            location,
            value,
            victim,
            attackers,
        })
    }

    /// Killmail ID.
    #[must_use]
    pub const fn id(&self) -> i64 {
        self.id
    }

    /// Time of the kill.
    #[must_use]
    pub const fn time(&self) -> DateTime<Utc> {
        self.time
    }

    /// Location of the kill.
    #[must_use]
    pub const fn location(&self) -> &Location {
        &self.location
    }

    /// Estimated ISK value.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }

    /// The victim.
    #[must_use]
    pub const fn victim(&self) -> &Participant {
        &self.victim
    }

    /// Attackers in reported order. Never empty.
    #[must_use]
    pub fn attackers(&self) -> &[Attacker] {
        &self.attackers
    }

    /// The attacker credited with the final blow, falling back to the first
    /// reported attacker.
    #[must_use]
    pub fn final_blow(&self) -> Option<&Attacker> {
        self.attackers
            .iter()
            .find(|a| a.final_blow)
            .or_else(|| self.attackers.first())
    }
}

impl TryFrom<RawKillmail> for Killmail {
    type Error = TrackerError;

    fn try_from(raw: RawKillmail) -> Result<Self, Self::Error> {
        let Some(victim) = raw.victim else {
            return Err(TrackerError::InvalidRecord(format!(
                "killmail {} has no victim",
                raw.killmail_id
            )));
        };
        Self::new(
            raw.killmail_id,
            raw.killmail_time,
            raw.location,
            raw.total_value,
            victim,
            raw.attackers,
        )
    }
}
