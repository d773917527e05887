//! WebSocket layer: connection handling, message routing, subscriptions.
//!
//! The WebSocket endpoint at `/ws` streams tracker events (matches,
//! deliveries, retries, dead letters, evictions) filtered per connection by
//! destination and event type.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
