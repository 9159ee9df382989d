/// Server setup and initialization
///
/// Wires together all components: draft store, registry catalog, workflow engine,
/// session hub and HTTP routes.

use crate::{
    api::{create_draft_routes, create_session_routes, AppState},
    config::Config,
    draft::{database::open_draft_pool, storage::{DraftStore, SqliteDraftStore}},
    runtime::{SessionHub, WorkflowEngine},
    workflow::registry::RegistryCatalog,
};
use anyhow::Result;
use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Build the session hub backed by the SQLite draft store in `config`
pub async fn create_hub(config: &Config) -> Result<Arc<SessionHub>> {
    tracing::info!("📁 Initializing draft store in {}", config.database.data_dir);
    let pool = open_draft_pool(&config.database.data_dir).await?;
    let store = SqliteDraftStore::new(pool);
    store
        .init_schema()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize draft schema: {}", e))?;

    let catalog = Arc::new(RegistryCatalog::with_builtin()?);
    tracing::info!("📊 Loaded {} flow registries", catalog.flows().len());

    let store: Arc<dyn DraftStore> = Arc::new(store);
    let engine = WorkflowEngine::new(catalog, store).with_autosave_interval(config.autosave.interval());
    tracing::info!("⏰ Autosave interval: {:?}", config.autosave.interval());

    tracing::info!("✅ Session hub initialized");
    Ok(Arc::new(SessionHub::new(engine)))
}

/// Create the Axum application over an existing hub
pub fn create_app(hub: Arc<SessionHub>) -> Router {
    let state = AppState { hub };

    tracing::info!("📡 Creating HTTP router with session and draft endpoints");
    Router::new()
        .route("/healthz", get(health_check))
        .merge(create_session_routes())
        .merge(create_draft_routes())
        .with_state(state)
}

/// Start the HTTP server with the given configuration
///
/// Abandoned sessions are closed by a background idle sweep. On ctrl-c the
/// server stops accepting requests, then every live session is saved once and
/// torn down.
pub async fn start_server(config: Config) -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting Phaseway server...");

    let hub = create_hub(&config).await?;
    let app = create_app(Arc::clone(&hub));

    let sweep_cancel = CancellationToken::new();
    let sweep = config.sessions.idle_timeout().map(|max_idle| {
        tracing::info!("🧹 Closing sessions idle for {:?}", max_idle);
        SessionHub::spawn_idle_sweep(&hub, max_idle, sweep_cancel.clone())
    });

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr).await?;

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweep_cancel.cancel();
    if let Some(sweep) = sweep {
        if let Err(e) = sweep.await {
            tracing::warn!("Idle sweep ended abnormally: {}", e);
        }
    }
    hub.shutdown().await;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("❌ Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

async fn health_check() -> &'static str {
    "ok"
}
