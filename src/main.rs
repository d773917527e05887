//! killtracker-gateway server entry point.
//!
//! Loads rules, restores persisted queues, starts the delivery workers and
//! serves the operator API until SIGINT or SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use killtracker_gateway::api;
use killtracker_gateway::app_state::AppState;
use killtracker_gateway::config::TrackerConfig;
use killtracker_gateway::delivery::{DeadLetterLog, WebhookTransport};
use killtracker_gateway::engine::{NoRoutes, RuleProvider, RuleStore};
use killtracker_gateway::persistence::{
    PostgresQueueStore, QueueSnapshotter, QueueStore, spawn_dead_letter_writer,
};
use killtracker_gateway::telemetry::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = TrackerConfig::from_env()?;
    init_tracing(config.log_json);
    tracing::info!(addr = %config.listen_addr, "starting killtracker-gateway");

    // Rules
    let rules = match &config.rules_path {
        Some(path) => RuleStore::from_file(path)?,
        None => {
            tracing::warn!("TRACKER_RULES_PATH not set, starting without rules");
            RuleStore::default()
        }
    };
    let snapshot = rules.snapshot();
    tracing::info!(
        rules = snapshot.rules().len(),
        rejected = snapshot.rejected().len(),
        "rules loaded"
    );

    // Persistence
    let store: Option<Arc<dyn QueueStore>> = if config.persistence_enabled {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await
            .context("connecting to PostgreSQL")?;
        let pg = PostgresQueueStore::new(pool);
        pg.migrate().await?;
        let store: Arc<dyn QueueStore> = Arc::new(pg);
        Some(store)
    } else {
        tracing::warn!("PERSISTENCE_ENABLED=false: queues are memory-only and lost on restart");
        None
    };

    let (dead_letter_tx, dead_letter_rx) = mpsc::unbounded_channel();
    let mut dead_letters = DeadLetterLog::new(config.dead_letter_capacity);
    if store.is_some() {
        dead_letters = dead_letters.with_forwarder(dead_letter_tx);
    }

    // Application state
    let transport = WebhookTransport::new(Duration::from_secs(config.delivery_timeout_secs.max(1)))?;
    let state = AppState::new(
        &config,
        rules,
        Arc::new(NoRoutes),
        Arc::new(transport),
        Arc::new(dead_letters),
    );

    // Restore queues and start background tasks
    let background = CancellationToken::new();
    let mut snapshotter = None;
    let mut tasks = Vec::new();
    if let Some(store) = &store {
        let s = QueueSnapshotter::new(Arc::clone(state.tracker.queues()), Arc::clone(store));
        let restored = s.restore().await?;
        tracing::info!(restored, "persisted queues restored");
        tasks.push(tokio::spawn(
            s.clone().run(config.snapshot_interval(), background.child_token()),
        ));
        tasks.push(spawn_dead_letter_writer(
            Arc::clone(store),
            dead_letter_rx,
            background.child_token(),
        ));
        snapshotter = Some(s);
    }
    state.tracker.start_workers().await;
    tasks.push(state.tracker.dispatcher().spawn_supervisor());

    // Serve
    let app = api::app(state.clone());
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Drain
    tracing::info!("shutting down");
    state.tracker.dispatcher().shutdown().await;
    background.cancel();
    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "background task failed");
        }
    }
    if let Some(s) = snapshotter {
        let saved = s.persist_all().await?;
        tracing::info!(saved, "queues persisted");
    }

    Ok(())
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received ctrl-c"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}
