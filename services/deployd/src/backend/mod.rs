//! Installer backend seam.
//!
//! The coordinator never parses a package itself; applying content and
//! running post-install steps are delegated through [`InstallerBackend`].
//! Which strategy backs the trait is negotiated once at startup by
//! [`select_backend`] and never changes while the process lives, so a
//! single run cannot mix calling conventions.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use gantry_types::LogEntry;
use thiserror::Error;
use tracing::info;

use crate::config::Config;
use crate::logging::InstallSink;

mod exec;
mod mock;

pub use exec::ExecBackend;
pub use mock::{MockBackend, MockOutcome};

/// Failure from an apply or post-step call.
///
/// Carries whatever the backend produced before failing so the audit trail
/// survives: partial log entries always, and the history directory when the
/// backend got far enough to create one.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct BackendError {
    pub message: String,
    pub entries: Vec<LogEntry>,
    pub history_path: Option<PathBuf>,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            entries: Vec::new(),
            history_path: None,
        }
    }

    pub fn with_entries(mut self, entries: Vec<LogEntry>) -> Self {
        self.entries = entries;
        self
    }

    pub fn with_history(mut self, history_path: PathBuf) -> Self {
        self.history_path = Some(history_path);
        self
    }
}

/// Result of a successful package apply.
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    /// History directory the backend created for this install.
    pub history_path: PathBuf,
    /// Structured entries the backend reported.
    pub entries: Vec<LogEntry>,
}

/// Contract between the coordinator and whatever installs packages.
#[async_trait]
pub trait InstallerBackend: Send + Sync {
    /// Apply the package's content changes. Post-install steps are not run
    /// here; the coordinator decides separately whether they happen inline
    /// or after a restart.
    async fn apply(
        &self,
        package: &Path,
        log: &dyn InstallSink,
    ) -> Result<ApplyOutcome, BackendError>;

    /// Execute the post-install steps recorded in an applied package.
    async fn run_post_steps(
        &self,
        package: &Path,
        history_path: &Path,
        log: &dyn InstallSink,
    ) -> Result<(), BackendError>;
}

/// Pick the backend strategy for the lifetime of this process.
///
/// With an installer program configured the exec backend probes it once and
/// fixes the calling convention; without one the mock backend serves local
/// development.
pub async fn select_backend(config: &Config) -> anyhow::Result<Arc<dyn InstallerBackend>> {
    match &config.backend_cmd {
        Some(program) => {
            let backend = ExecBackend::negotiate(program, &config.history_root).await?;
            Ok(Arc::new(backend))
        }
        None => {
            info!("No installer program configured, using mock backend");
            Ok(Arc::new(MockBackend::new(config.history_root.clone())))
        }
    }
}
