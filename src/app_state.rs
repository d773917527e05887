//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::TrackerConfig;
use crate::delivery::{DeadLetterLog, DeadLetterSink, Dispatcher, Transport};
use crate::domain::EventBus;
use crate::engine::{PayloadFormatter, RouteOracle, RuleEngine, RuleStore};
use crate::queue::QueueRegistry;
use crate::service::TrackerService;
use crate::telemetry::{Observer, Telemetry};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Tracker service for all business logic.
    pub tracker: Arc<TrackerService>,
    /// Recent dead letters.
    pub dead_letters: Arc<DeadLetterLog>,
    /// Pipeline counters.
    pub telemetry: Arc<Telemetry>,
    /// Event bus for WebSocket subscriptions.
    pub event_bus: EventBus,
}

impl AppState {
    /// Wires the engine, queues, dispatcher and telemetry together.
    ///
    /// No worker is started; call [`TrackerService::start_workers`] once
    /// persisted queues have been restored.
    #[must_use]
    pub fn new(
        config: &TrackerConfig,
        rules: RuleStore,
        routes: Arc<dyn RouteOracle>,
        transport: Arc<dyn Transport>,
        dead_letters: Arc<DeadLetterLog>,
    ) -> Self {
        let event_bus = EventBus::new(config.event_bus_capacity);
        let telemetry = Arc::new(Telemetry::new(event_bus.clone()));
        let observer: Arc<dyn Observer> = Arc::clone(&telemetry) as Arc<dyn Observer>;

        let engine = RuleEngine::new(
            PayloadFormatter::new(config.killmail_link_base.clone()),
            routes,
            Arc::clone(&observer),
        );
        let registry = Arc::new(QueueRegistry::new(config.queue_max_size, Arc::clone(&observer)));
        let dispatcher = Dispatcher::new(
            registry,
            transport,
            config.worker_settings(),
            Arc::clone(&dead_letters) as Arc<dyn DeadLetterSink>,
            observer,
        );
        let tracker = TrackerService::new(Arc::new(engine), Arc::new(rules), Arc::new(dispatcher));

        Self {
            tracker: Arc::new(tracker),
            dead_letters,
            telemetry,
            event_bus,
        }
    }
}
