//! Process lifecycle hooks.
//!
//! The host signals shutdown through a shared flag rather than cancelling
//! anything: an active install run polls it at its loop boundaries and at
//! the apply/post-step seam, so a stop never interrupts the backend
//! mid-package. Startup is the mirror image, it settles debts (restart
//! marker, deferred post-steps) before the first normal run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, info};

use crate::coordinator::Coordinator;

/// Cooperative shutdown signal shared between the host process and the
/// coordinator.
#[derive(Clone, Debug, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Startup hook: consume a stale restart marker, finish post-steps a
/// previous process owed, then kick off a normal run in the background.
pub async fn on_startup(coordinator: Arc<Coordinator>) {
    info!(version = env!("CARGO_PKG_VERSION"), "Deployer starting");

    coordinator.recover_from_restart_marker();

    if let Err(err) = coordinator.resume_deferred_post_steps().await {
        error!(error = %err, "Could not resume deferred post-steps");
    }

    spawn_run(coordinator);
}

/// Shutdown hook: raise the flag. An active run observes it at the next
/// boundary and defers whatever post-steps are still owed.
pub fn on_shutdown(shutdown: &ShutdownFlag) {
    info!("Shutdown indicated, an active install run will defer its post-steps");
    shutdown.set();
}

/// Dispatch a coordinator run onto a background task; the report lands in
/// the process log.
pub fn spawn_run(coordinator: Arc<Coordinator>) {
    tokio::spawn(async move {
        match coordinator.run().await {
            Ok(report) => info!(
                outcome = ?report.outcome,
                installed = report.installed.len(),
                "Background install run finished"
            ),
            Err(err) => error!(error = %err, "Background install run failed"),
        }
    });
}
