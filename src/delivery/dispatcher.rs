//! Supervisor of the per-destination delivery workers.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tokio::task::{AbortHandle, JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::dead_letter::DeadLetterSink;
use super::transport::Transport;
use super::worker::{DeliveryWorker, WorkerSettings};
use crate::domain::{Destination, DestinationId, Notification};
use crate::queue::{DispatchQueue, EnqueueOutcome, QueueRegistry};
use crate::telemetry::Observer;

#[derive(Debug)]
struct WorkerSlot {
    config: watch::Sender<Destination>,
    handle: AbortHandle,
}

#[derive(Debug, Default)]
struct Workers {
    slots: HashMap<DestinationId, WorkerSlot>,
    tasks: JoinSet<()>,
}

impl Workers {
    /// Collects finished tasks so `tasks.len()` only counts live workers.
    fn reap(&mut self) {
        while let Some(joined) = self.tasks.try_join_next() {
            if let Err(e) = joined {
                tracing::error!(error = %e, "delivery worker died");
            }
        }
    }
}

/// Routes notifications into queues and keeps one worker per queue.
///
/// Workers are spawned lazily the first time a destination is seen and
/// all share one cancellation token. A worker that dies is restarted on
/// the same queue by [`Dispatcher::restart_dead_workers`].
#[derive(Debug)]
pub struct Dispatcher {
    registry: Arc<QueueRegistry>,
    transport: Arc<dyn Transport>,
    settings: WorkerSettings,
    dead_letters: Arc<dyn DeadLetterSink>,
    observer: Arc<dyn Observer>,
    cancel: CancellationToken,
    workers: Mutex<Workers>,
}

impl Dispatcher {
    /// Creates a dispatcher without workers.
    #[must_use]
    pub fn new(
        registry: Arc<QueueRegistry>,
        transport: Arc<dyn Transport>,
        settings: WorkerSettings,
        dead_letters: Arc<dyn DeadLetterSink>,
        observer: Arc<dyn Observer>,
    ) -> Self {
        Self {
            registry,
            transport,
            settings,
            dead_letters,
            observer,
            cancel: CancellationToken::new(),
            workers: Mutex::new(Workers::default()),
        }
    }

    /// Queue registry shared with the workers.
    #[must_use]
    pub fn registry(&self) -> &Arc<QueueRegistry> {
        &self.registry
    }

    /// Returns the queue for `destination`, spawning its worker on first
    /// use or if the previous one died. For a live worker, changed
    /// settings are pushed to it.
    pub async fn ensure_worker(&self, destination: &Destination) -> Arc<DispatchQueue> {
        let queue = self.registry.get_or_create(destination.id).await;
        let mut workers = self.workers.lock().await;
        workers.reap();

        if let Some(slot) = workers.slots.get(&destination.id)
            && !slot.handle.is_finished()
        {
            slot.config.send_if_modified(|current| {
                if current == destination {
                    false
                } else {
                    *current = destination.clone();
                    true
                }
            });
            return queue;
        }
        if self.cancel.is_cancelled() {
            return queue;
        }
        if workers.slots.contains_key(&destination.id) {
            tracing::warn!(destination_id = %destination.id, "restarting dead delivery worker");
        }
        self.spawn_worker(&mut workers, Arc::clone(&queue), destination.clone());
        queue
    }

    fn spawn_worker(&self, workers: &mut Workers, queue: Arc<DispatchQueue>, destination: Destination) {
        let destination_id = destination.id;
        let name = destination.name.clone();
        let (config, rx) = watch::channel(destination);
        let worker = DeliveryWorker::new(
            queue,
            rx,
            Arc::clone(&self.transport),
            self.settings,
            Arc::clone(&self.dead_letters),
            Arc::clone(&self.observer),
        );
        let handle = workers.tasks.spawn(worker.run(self.cancel.child_token()));
        workers.slots.insert(destination_id, WorkerSlot { config, handle });
        tracing::debug!(%destination_id, %name, "worker spawned");
    }

    /// Restarts every worker whose task has ended while the dispatcher is
    /// still running. Returns the number restarted.
    pub async fn restart_dead_workers(&self) -> usize {
        if self.cancel.is_cancelled() {
            return 0;
        }
        let mut workers = self.workers.lock().await;
        workers.reap();
        let dead: Vec<(DestinationId, Destination)> = workers
            .slots
            .iter()
            .filter(|(_, slot)| slot.handle.is_finished())
            .map(|(id, slot)| (*id, slot.config.borrow().clone()))
            .collect();
        for (destination_id, destination) in &dead {
            let queue = self.registry.get_or_create(*destination_id).await;
            tracing::warn!(%destination_id, depth = queue.peek_size(), "restarting dead delivery worker");
            self.spawn_worker(&mut workers, queue, destination.clone());
        }
        dead.len()
    }

    /// Spawns a task that calls [`Dispatcher::restart_dead_workers`] every
    /// poll interval until [`Dispatcher::shutdown`].
    #[must_use]
    pub fn spawn_supervisor(self: &Arc<Self>) -> JoinHandle<()> {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(dispatcher.settings.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = dispatcher.cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        dispatcher.restart_dead_workers().await;
                    }
                }
            }
        })
    }

    /// Enqueues `notification` on `destination`'s queue.
    pub async fn submit(&self, destination: &Destination, notification: Notification) -> EnqueueOutcome {
        self.ensure_worker(destination).await.enqueue(notification)
    }

    /// Applies a full set of destinations, e.g. after a rule reload.
    ///
    /// Workers of destinations missing from the set are disabled; their
    /// queues are held until the destination is configured again.
    pub async fn sync_destinations<'a>(&self, destinations: impl IntoIterator<Item = &'a Destination>) {
        let mut configured = HashSet::new();
        for destination in destinations {
            configured.insert(destination.id);
            self.ensure_worker(destination).await;
        }
        let workers = self.workers.lock().await;
        for (destination_id, slot) in &workers.slots {
            if configured.contains(destination_id) {
                continue;
            }
            let disabled = slot.config.send_if_modified(|current| {
                let was_enabled = current.enabled;
                current.enabled = false;
                was_enabled
            });
            if disabled {
                tracing::warn!(%destination_id, "destination no longer configured, holding its queue");
            }
        }
    }

    /// Number of running workers.
    pub async fn worker_count(&self) -> usize {
        let mut workers = self.workers.lock().await;
        workers.reap();
        workers.tasks.len()
    }

    /// Returns `true` once [`Dispatcher::shutdown`] has been called.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stops every worker and waits for in-flight deliveries to finish.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let mut tasks = std::mem::take(&mut self.workers.lock().await.tasks);
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "delivery worker panicked");
            }
        }
        tracing::info!("all delivery workers stopped");
    }
}
