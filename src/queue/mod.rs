//! Dispatch queues: bounded per-destination FIFOs and their registry.

pub mod dispatch_queue;
pub mod registry;

pub use dispatch_queue::{DispatchQueue, EnqueueOutcome, QueueStats};
pub use registry::QueueRegistry;
