//! Domain layer: killmails, rules, destinations, notifications and the
//! tracker event bus.
//!
//! Everything here is plain data plus validation. Evaluation lives in
//! [`crate::engine`], buffering in [`crate::queue`] and outbound delivery
//! in [`crate::delivery`].

pub mod destination;
pub mod event_bus;
pub mod ids;
pub mod killmail;
pub mod notification;
pub mod rule;
pub mod tracker_event;

pub use destination::{Destination, RateLimit};
pub use event_bus::EventBus;
pub use ids::{DestinationId, RuleId};
pub use killmail::{Attacker, Killmail, Location, Participant, RawKillmail};
pub use notification::Notification;
pub use rule::{Clause, Polarity, Rule, Subject};
pub use tracker_event::{TrackerEvent, WorkerState};
