//! Delivery: transport seam, retry policy, rate limiting, dead letters and
//! the per-destination workers that tie them together.

pub mod dead_letter;
pub mod dispatcher;
pub mod error;
pub mod rate_limit;
pub mod retry;
pub mod transport;
pub mod worker;

pub use dead_letter::{DeadLetter, DeadLetterLog, DeadLetterSink};
pub use dispatcher::Dispatcher;
pub use error::DeliveryError;
pub use rate_limit::RateLimiter;
pub use retry::RetryPolicy;
pub use transport::{Transport, WebhookTransport};
pub use worker::{DeliveryWorker, DrainReport, WorkerSettings};
