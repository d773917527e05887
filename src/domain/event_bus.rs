//! Fan-out of [`TrackerEvent`]s to WebSocket subscribers.
//!
//! Telemetry publishes every pipeline event here. Each WebSocket connection
//! holds its own receiver and filters by destination and event type.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;

use super::TrackerEvent;

/// Broadcast bus for [`TrackerEvent`]s.
///
/// A slow receiver loses the oldest events once `capacity` is exceeded and
/// sees a `Lagged` error instead; publishers never block.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<TrackerEvent>,
    published: Arc<AtomicU64>,
}

impl EventBus {
    /// Creates a bus buffering up to `capacity` events per receiver.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            published: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Publishes `event` and returns how many receivers got it.
    pub fn publish(&self, event: TrackerEvent) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(event)) => {
                tracing::trace!(event_type = event.event_type_str(), "event published without subscribers");
                0
            }
        }
    }

    /// New receiver for events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.sender.subscribe()
    }

    /// Connected receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Events published since start, including those nobody received.
    #[must_use]
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}
