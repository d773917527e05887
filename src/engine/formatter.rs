//! Webhook payload formatting.
//!
//! Payloads follow the Discord webhook shape (`content` plus one embed),
//! which most chat webhooks accept. Names are not resolved here: IDs are
//! printed as-is and the zKillboard link carries the full details.

use serde_json::json;

use crate::domain::{Killmail, Participant, Rule};

/// Builds webhook payloads for matched killmails.
#[derive(Debug, Clone)]
pub struct PayloadFormatter {
    link_base: String,
}

impl PayloadFormatter {
    /// Creates a formatter linking to `link_base` (e.g.
    /// `https://zkillboard.com/kill/`).
    #[must_use]
    pub fn new(link_base: impl Into<String>) -> Self {
        let mut link_base = link_base.into();
        if !link_base.ends_with('/') {
            link_base.push('/');
        }
        Self { link_base }
    }

    /// Returns the link for a killmail.
    #[must_use]
    pub fn link(&self, killmail_id: i64) -> String {
        format!("{}{killmail_id}/", self.link_base)
    }

    /// Formats the payload announcing `killmail` for `rule`.
    #[must_use]
    pub fn format(&self, killmail: &Killmail, rule: &Rule) -> serde_json::Value {
        let link = self.link(killmail.id());
        let location = killmail.location();
        let victim = killmail.victim();
        let final_blow = killmail
            .final_blow()
            .map_or_else(|| "unknown".to_string(), |a| describe(&a.participant));

        let mut fields = vec![
            json!({ "name": "Victim", "value": describe(victim), "inline": true }),
            json!({ "name": "Final blow", "value": final_blow, "inline": true }),
            json!({ "name": "Attackers", "value": killmail.attackers().len().to_string(), "inline": true }),
            json!({ "name": "Value", "value": format_isk(killmail.value()), "inline": true }),
            json!({ "name": "Solar system", "value": location.solar_system_id.to_string(), "inline": true }),
        ];
        if let Some(region_id) = location.region_id {
            fields.push(json!({ "name": "Region", "value": region_id.to_string(), "inline": true }));
        }

        let ship = victim
            .ship_type_id
            .map_or_else(|| "unknown ship".to_string(), |t| format!("ship type {t}"));
        let title = format!(
            "Kill {} in system {}: {ship}",
            killmail.id(),
            location.solar_system_id
        );

        json!({
            "content": format!("Tracker **{}** matched a killmail worth {}", rule.name, format_isk(killmail.value())),
            "embeds": [{
                "title": title,
                "url": link,
                "timestamp": killmail.time().to_rfc3339(),
                "fields": fields,
            }],
        })
    }
}

fn describe(participant: &Participant) -> String {
    let mut parts = Vec::new();
    if let Some(id) = participant.character_id {
        parts.push(format!("character {id}"));
    }
    if let Some(id) = participant.corporation_id {
        parts.push(format!("corporation {id}"));
    }
    if let Some(id) = participant.alliance_id {
        parts.push(format!("alliance {id}"));
    }
    if let Some(id) = participant.ship_type_id {
        parts.push(format!("ship type {id}"));
    }
    if parts.is_empty() {
        "unknown".to_string()
    } else {
        parts.join(", ")
    }
}

/// Formats an ISK amount with a magnitude suffix (`1.50b ISK`).
#[must_use]
pub fn format_isk(value: f64) -> String {
    const UNITS: [(f64, &str); 4] = [(1e12, "t"), (1e9, "b"), (1e6, "m"), (1e3, "k")];
    for (scale, suffix) in UNITS {
        if value >= scale {
            return format!("{:.2}{suffix} ISK", value / scale);
        }
    }
    format!("{value:.0} ISK")
}
