//! # killtracker-gateway
//!
//! Filter-and-dispatch service for killmails. Every incoming killmail is
//! evaluated against a set of tracker rules; each match becomes a
//! notification in a bounded per-destination queue, drained by a worker
//! that delivers to a webhook within the destination's rate limit and
//! retries transient failures with exponential backoff.
//!
//! ## Architecture
//!
//! ```text
//! Ingestion (POST /api/v1/killmails)
//!     │
//!     ├── TrackerService (service/)
//!     │       │
//!     │       ├── RuleEngine + RuleStore (engine/)
//!     │       └── Dispatcher (delivery/)
//!     │
//!     ├── DispatchQueue per destination (queue/)
//!     │       └── DeliveryWorker ── Transport ── webhook
//!     │                 └── DeadLetterLog
//!     │
//!     ├── Telemetry → EventBus → WebSocket (/ws)
//!     │
//!     └── PostgreSQL queue snapshots (persistence/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod delivery;
pub mod domain;
pub mod engine;
pub mod error;
pub mod persistence;
pub mod queue;
pub mod service;
pub mod telemetry;
pub mod ws;
