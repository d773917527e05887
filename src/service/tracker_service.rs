//! Tracker service: ties rule evaluation to the dispatch queues.

use std::sync::Arc;

use serde::Serialize;
use utoipa::ToSchema;

use crate::delivery::Dispatcher;
use crate::domain::{DestinationId, Killmail, RawKillmail, Rule, RuleId};
use crate::engine::{RuleEngine, RuleProvider, RuleSnapshot, RuleStore};
use crate::error::TrackerError;
use crate::queue::{EnqueueOutcome, QueueRegistry, QueueStats};

/// One notification produced while ingesting a killmail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct MatchedRoute {
    /// Matching rule.
    #[schema(value_type = uuid::Uuid)]
    pub rule_id: RuleId,
    /// Queue the notification was routed to.
    #[schema(value_type = uuid::Uuid)]
    pub destination_id: DestinationId,
    /// Queued notification.
    pub notification_id: uuid::Uuid,
    /// Notification evicted to make room, if the queue was full.
    pub evicted_id: Option<uuid::Uuid>,
}

/// Result of ingesting one killmail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct IngestReport {
    /// Ingested killmail.
    pub killmail_id: i64,
    /// Notifications produced, in rule order.
    pub matches: Vec<MatchedRoute>,
}

/// Orchestration layer for killmail ingestion and rule administration.
///
/// Every killmail is evaluated against one rule snapshot taken at the start
/// of the call, so a concurrent reload never splits an evaluation pass.
#[derive(Debug, Clone)]
pub struct TrackerService {
    engine: Arc<RuleEngine>,
    rules: Arc<RuleStore>,
    dispatcher: Arc<Dispatcher>,
}

impl TrackerService {
    /// Creates a new `TrackerService`.
    #[must_use]
    pub fn new(engine: Arc<RuleEngine>, rules: Arc<RuleStore>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            engine,
            rules,
            dispatcher,
        }
    }

    /// Returns a reference to the inner [`RuleStore`].
    #[must_use]
    pub fn rules(&self) -> &Arc<RuleStore> {
        &self.rules
    }

    /// Returns a reference to the inner [`Dispatcher`].
    #[must_use]
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Returns a reference to the queue registry.
    #[must_use]
    pub fn queues(&self) -> &Arc<QueueRegistry> {
        self.dispatcher.registry()
    }

    /// Spawns a worker for every configured destination and warns about
    /// restored queues nobody is configured to drain.
    pub async fn start_workers(&self) {
        let snapshot = self.rules.snapshot();
        self.dispatcher.sync_destinations(snapshot.destinations()).await;
        for queue in self.queues().all().await {
            if snapshot.destination(queue.destination_id()).is_none() && queue.peek_size() > 0 {
                tracing::warn!(
                    destination_id = %queue.destination_id(),
                    depth = queue.peek_size(),
                    "queued notifications for an unconfigured destination are held"
                );
            }
        }
    }

    /// Evaluates one killmail and queues a notification per matching rule.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::InvalidRecord`] if the killmail has no
    /// victim or no attackers. Nothing is queued in that case.
    pub async fn ingest(&self, raw: RawKillmail) -> Result<IngestReport, TrackerError> {
        let snapshot = self.rules.snapshot();
        let killmail = Killmail::try_from(raw)?;
        let notifications = self.engine.evaluate(&killmail, snapshot.rules());

        let mut matches = Vec::with_capacity(notifications.len());
        for notification in notifications {
            let Some(destination) = snapshot.destination(notification.destination_id) else {
                tracing::error!(
                    rule_id = %notification.rule_id,
                    destination_id = %notification.destination_id,
                    "matched rule has no destination in its snapshot"
                );
                continue;
            };
            let mut route = MatchedRoute {
                rule_id: notification.rule_id,
                destination_id: notification.destination_id,
                notification_id: notification.id,
                evicted_id: None,
            };
            if let EnqueueOutcome::Evicted { evicted_id } = self.dispatcher.submit(destination, notification).await {
                route.evicted_id = Some(evicted_id);
            }
            matches.push(route);
        }

        tracing::debug!(
            killmail_id = killmail.id(),
            matches = matches.len(),
            "killmail evaluated"
        );
        Ok(IngestReport {
            killmail_id: killmail.id(),
            matches,
        })
    }

    /// Ingests killmails one by one. A malformed record only fails its own
    /// entry.
    pub async fn ingest_batch(&self, raws: Vec<RawKillmail>) -> Vec<Result<IngestReport, TrackerError>> {
        let mut results = Vec::with_capacity(raws.len());
        for raw in raws {
            results.push(self.ingest(raw).await);
        }
        results
    }

    /// Re-reads the rule file and applies destination changes to running
    /// workers.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Configuration`] if the file cannot be read
    /// or parsed; the previous rules stay active.
    pub async fn reload_rules(&self) -> Result<Arc<RuleSnapshot>, TrackerError> {
        let snapshot = self.rules.reload()?;
        self.dispatcher.sync_destinations(snapshot.destinations()).await;
        Ok(snapshot)
    }

    /// Enables or disables a rule.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::RuleNotFound`] for an unknown rule.
    pub fn set_rule_enabled(&self, rule_id: RuleId, enabled: bool) -> Result<Rule, TrackerError> {
        let rule = self.rules.set_enabled(rule_id, enabled)?;
        tracing::info!(%rule_id, enabled, "rule toggled");
        Ok(rule)
    }

    /// Stats of every queue, sorted by destination.
    pub async fn queue_stats(&self) -> Vec<QueueStats> {
        self.queues().stats().await
    }

    /// Stats of one queue.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::DestinationNotFound`] if no queue exists.
    pub async fn queue(&self, destination_id: DestinationId) -> Result<QueueStats, TrackerError> {
        Ok(self.queues().get(destination_id).await?.stats())
    }

    /// Drops every queued notification of one destination.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::DestinationNotFound`] if no queue exists.
    pub async fn purge_queue(&self, destination_id: DestinationId) -> Result<usize, TrackerError> {
        let purged = self.queues().get(destination_id).await?.purge();
        tracing::info!(%destination_id, purged, "queue purged");
        Ok(purged)
    }
}
