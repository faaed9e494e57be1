//! Course Cache node
//!
//! Serves the peer cache protocol, ring membership and enrollment endpoints.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use course_cache::db::{CourseStore, MemoryStore, PgStore};
use course_cache::peer::PeerPool;
use course_cache::{create_router, spawn_cleanup_task, AppState, Config};

const REGISTER_ATTEMPTS: u32 = 5;

/// Main entry point for a cache node.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the relational store (Postgres, or in-memory without `DATABASE_URL`)
/// 4. Build the peer pool, cache groups and booking coordinator
/// 5. Start background TTL cleanup task
/// 6. Register with the coordinator unless this node is the coordinator
/// 7. Serve HTTP until SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "course_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting course cache node");

    let config = Config::from_env();
    info!(
        "Configuration loaded: self_host={}, main_host={}, replicas={}, peer_timeout={}ms, default_ttl={}s, port={}",
        config.self_host,
        config.main_host,
        config.hash_replicas,
        config.peer_timeout_ms,
        config.default_ttl,
        config.server_port
    );

    let store: Arc<dyn CourseStore> = match &config.database_url {
        Some(url) => {
            let store = PgStore::connect(url, 10)
                .await
                .context("failed to connect to postgres")?;
            store
                .ensure_schema()
                .await
                .context("failed to create schema")?;
            Arc::new(store)
        }
        None => {
            warn!("DATABASE_URL not set, using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let state = AppState::from_config(config.clone(), store)
        .await
        .context("failed to initialise node state")?;
    info!(groups = ?state.manager.group_names().await, "cache groups registered");

    let cleanup_handle = spawn_cleanup_task(state.manager.clone(), config.cleanup_interval);
    info!("Background cleanup task started");

    if !config.is_coordinator() {
        tokio::spawn(register_with_coordinator(
            state.peers.clone(),
            config.main_host.clone(),
        ));
    }

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cleanup_handle))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Announces this node to the coordinator, backing off between attempts.
async fn register_with_coordinator(peers: Arc<PeerPool>, main_host: String) {
    let mut delay = Duration::from_millis(500);
    for attempt in 1..=REGISTER_ATTEMPTS {
        match peers.register_with(&main_host).await {
            Ok(()) => return,
            Err(err) => {
                warn!(attempt, main_host = %main_host, error = %err, "registration with coordinator failed");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }
    }
    warn!(main_host = %main_host, "giving up on coordinator registration");
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the cleanup task and allows graceful shutdown.
async fn shutdown_signal(cleanup_handle: tokio::task::JoinHandle<()>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    cleanup_handle.abort();
    warn!("Cleanup task aborted");
}
