//! Gantry Deployment Daemon
//!
//! Watches a drop folder for `*.update` packages and installs them one at a
//! time through an installer backend. Post-install steps interrupted by a
//! shutdown are finished at the next startup.
//!
//! ## Lifecycle
//!
//! - **Startup**: consume restart marker, finish deferred post-steps, run
//! - **Normal**: runs triggered over the admin API, one at a time
//! - **Shutdown**: raise the flag; an active run defers and the host is
//!   asked to restart

use std::fs;
use std::sync::Arc;

use anyhow::Result;
use gantry_deployd::{
    api, backend, config, lifecycle, state::SqliteStateStore, Coordinator, ShutdownFlag,
};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = config::Config::from_env()?;

    // Initialize tracing (prefer RUST_LOG, fallback to GANTRY_LOG_LEVEL)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting gantry deployment daemon");
    info!(
        server_name = %config.server_name,
        package_source = %config.package_source.display(),
        history_root = %config.history_root.display(),
        state_db = %config.state_db.display(),
        "Configuration loaded"
    );

    // The drop folder and history root must exist before anything scans them
    fs::create_dir_all(&config.package_source)?;
    fs::create_dir_all(&config.history_root)?;
    if let Some(parent) = config.state_db.parent() {
        fs::create_dir_all(parent)?;
    }

    let store = Arc::new(SqliteStateStore::open(&config.state_db)?);
    let backend = backend::select_backend(&config).await?;
    let shutdown = ShutdownFlag::new();

    let coordinator = Arc::new(Coordinator::new(
        config.clone(),
        store,
        backend,
        shutdown.clone(),
    ));

    // Startup hook: marker recovery, deferred post-steps, first run
    lifecycle::on_startup(Arc::clone(&coordinator)).await;

    // Create shutdown channel for the HTTP server
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Build and run the admin API
    let app = api::create_router(api::AppState {
        coordinator: Arc::clone(&coordinator),
    });

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Admin API listening");

    // Spawn the server with graceful shutdown
    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let mut shutdown_rx = shutdown_rx;
                loop {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                    if shutdown_rx.changed().await.is_err() {
                        break;
                    }
                }
                info!("Admin API shutting down");
            })
            .await
    });

    // Wait for shutdown signal (Ctrl+C)
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = server_handle => {
            match result {
                Ok(Ok(())) => info!("Server exited normally"),
                Ok(Err(e)) => error!(error = %e, "Server error"),
                Err(e) => error!(error = %e, "Server task panicked"),
            }
        }
    }

    // Raise the flag first so an active run defers at its next boundary,
    // then stop serving
    lifecycle::on_shutdown(&shutdown);
    let _ = shutdown_tx.send(true);

    // Give an in-flight run time to reach a boundary and write its record
    info!("Waiting for the active run to reach a boundary...");
    tokio::time::sleep(std::time::Duration::from_secs(2)).await;

    info!("Deployment daemon shutdown complete");
    Ok(())
}
