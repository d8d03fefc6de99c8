//! Installation coordinator.
//!
//! Owns the installer state machine and the package-processing loop: scan
//! the drop folder, apply each `*.update` package through the backend, run
//! its post-install steps, and leave an audit trail per package. Mutual
//! exclusion is enforced through the persisted per-machine state plus the
//! deferred post-step record, never in-process locks, so separate server
//! processes sharing the state store exclude each other too.
//!
//! A shutdown observed between package-apply and post-steps does not lose
//! work: the post-steps are owed to the next startup through a record file
//! in the drop folder, and the interrupted package finishes before anything
//! new is considered.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use gantry_types::{
    CompletionNotification, DeployerStatus, InstallStatus, InstallerState, LogEntry,
    PostStepDescriptor, RunOutcome, RunReport,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::backend::InstallerBackend;
use crate::config::Config;
use crate::lifecycle::ShutdownFlag;
use crate::logging::InstallLogger;
use crate::notify;
use crate::restart;
use crate::state::{StateStore, StateStoreError};

/// Package file extension the drop folder is scanned for.
pub const PACKAGE_EXT: &str = "update";

/// Deferred post-step record, written to the drop folder. At most one
/// exists at a time.
pub const POST_STEP_RECORD_FILE: &str = "pending-post-steps.json";

/// Captured installer output, per history directory.
const INSTALL_LOG_FILE: &str = "Install.log";

/// Structured backend entries, next to the install log.
const MESSAGES_FILE: &str = "messages.json";

const TIMESTAMP_FMT: &str = "%Y%m%d%H%M%S";

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("state store error: {0}")]
    Store(#[from] StateStoreError),

    #[error("package source error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record serialization error: {0}")]
    Record(#[from] serde_json::Error),
}

/// How one package left the processing loop.
enum PackageDisposition {
    /// Applied and post-stepped; the loop continues.
    Installed,
    /// Shutdown interrupted it; the record is written and the run ends.
    Deferred,
    /// Failed; the queue is blocked until an operator intervenes.
    Failed,
    /// Content was applied but the deferral bookkeeping failed; the lane
    /// stays held so nothing new starts over a half-finished install.
    DeferralFailed,
}

/// Everything a package leaves behind regardless of how it went.
#[derive(Default)]
struct InstallArtifacts {
    /// Terminal status; `None` when post-steps were deferred.
    status: Option<InstallStatus>,
    history_path: Option<PathBuf>,
    entries: Vec<LogEntry>,
}

pub struct Coordinator {
    config: Config,
    store: Arc<dyn StateStore>,
    backend: Arc<dyn InstallerBackend>,
    shutdown: ShutdownFlag,
}

impl Coordinator {
    pub fn new(
        config: Config,
        store: Arc<dyn StateStore>,
        backend: Arc<dyn InstallerBackend>,
        shutdown: ShutdownFlag,
    ) -> Self {
        Self {
            config,
            store,
            backend,
            shutdown,
        }
    }

    /// Process every pending package, oldest name first.
    ///
    /// Returns without touching anything when another invocation or
    /// instance owns the install lane, or when a deferred post-step record
    /// is still unconsumed.
    pub async fn run(&self) -> Result<RunReport, CoordinatorError> {
        if self.record_exists() {
            info!("Install run skipped, a deferred post-step record is pending");
            return Ok(RunReport::skipped("deferred post-steps pending"));
        }

        let state = self.state()?;
        if state != InstallerState::Ready {
            info!(state = %state, "Install run skipped, another install owns the lane");
            return Ok(RunReport::skipped(format!("installer state is {state}")));
        }

        let packages = self.pending_packages()?;
        let mut report = RunReport {
            outcome: RunOutcome::Completed,
            installed: Vec::new(),
            failed_package: None,
            deferred_package: None,
            skip_reason: None,
        };
        if packages.is_empty() {
            debug!("Package source empty, nothing to install");
            return Ok(report);
        }

        info!(count = packages.len(), "Starting install run");
        self.set_state(InstallerState::InstallingPackage)?;

        let logger = InstallLogger::new();

        for package in &packages {
            let package_name = display_name(package);

            if self.shutdown.is_set() {
                info!("Shutdown observed before the next package, stopping run");
                self.set_state(InstallerState::Ready)?;
                report.outcome = RunOutcome::Aborted;
                return Ok(report);
            }

            match self.process_package(package, &logger).await {
                PackageDisposition::Installed => report.installed.push(package_name),
                PackageDisposition::Deferred => {
                    report.outcome = RunOutcome::Deferred;
                    report.deferred_package = Some(package_name);
                    return Ok(report);
                }
                PackageDisposition::Failed => {
                    report.outcome = RunOutcome::Failed;
                    report.failed_package = Some(package_name);
                    self.set_state(InstallerState::Ready)?;
                    return Ok(report);
                }
                PackageDisposition::DeferralFailed => {
                    report.outcome = RunOutcome::Failed;
                    report.failed_package = Some(package_name);
                    return Ok(report);
                }
            }
        }

        self.set_state(InstallerState::Ready)?;
        info!(installed = report.installed.len(), "Install run complete");
        Ok(report)
    }

    /// Finish post-steps a previous process owed before it went down.
    ///
    /// The record is consumed regardless of outcome so one bad package
    /// cannot block every future startup; the completion notification goes
    /// to the result path recorded before the restart.
    pub async fn resume_deferred_post_steps(&self) -> Result<(), CoordinatorError> {
        let record_path = self.record_path();
        if !record_path.exists() {
            debug!("No deferred post-step record");
            return Ok(());
        }

        // Another process sharing the machine key may already be installing
        // or resuming; the record is its to consume.
        let state = self.state()?;
        if matches!(
            state,
            InstallerState::InstallingPackage | InstallerState::InstallingPostSteps
        ) {
            warn!(state = %state, "Can't run deferred post-steps, an install is active");
            return Ok(());
        }

        let descriptor: PostStepDescriptor = match fs::read_to_string(&record_path)
            .map_err(CoordinatorError::from)
            .and_then(|raw| serde_json::from_str(&raw).map_err(CoordinatorError::from))
        {
            Ok(descriptor) => descriptor,
            Err(err) => {
                error!(record = %record_path.display(), error = %err, "Deferred post-step record unreadable, discarding");
                remove_file_logged(&record_path);
                self.set_state(InstallerState::Ready)?;
                return Ok(());
            }
        };

        let package = &descriptor.post_step_package_filename;
        info!(package = %package.display(), "Resuming deferred post-steps");
        self.set_state(InstallerState::InstallingPostSteps)?;

        let logger = InstallLogger::new();
        let status = match self
            .backend
            .run_post_steps(package, &descriptor.history_path, &logger)
            .await
        {
            Ok(()) => {
                self.archive_package(package, &descriptor.history_path);
                InstallStatus::Success
            }
            Err(err) => {
                // The package stays in the drop folder and gets a fresh
                // install attempt on the next run.
                error!(package = %package.display(), error = %err, "Deferred post-steps failed");
                InstallStatus::Fail
            }
        };

        let lines = logger.captured_lines();
        if let Err(err) = logger.write_messages(&descriptor.history_path.join(INSTALL_LOG_FILE)) {
            warn!(error = %err, "Could not write install log for deferred post-steps");
        }

        let notification = CompletionNotification {
            status,
            server_name: self.config.server_name.clone(),
            deploy_history_path: descriptor.history_path.display().to_string(),
            log_lines: (status == InstallStatus::Fail).then_some(lines),
        };
        notify::write_notification(&descriptor.result_file_name, &notification);

        remove_file_logged(&record_path);
        self.set_state(InstallerState::Ready)?;
        info!(package = %package.display(), status = ?status, "Deferred post-steps finished");
        Ok(())
    }

    /// A restart marker means the previous process died mid-run and its
    /// persisted state may be stale. Consume the marker and force the lane
    /// open before any guard is evaluated.
    pub fn recover_from_restart_marker(&self) {
        let marker = &self.config.restart_marker;
        if !marker.exists() {
            return;
        }

        warn!(marker = %marker.display(), "Restart marker found, forcing installer state to ready");
        remove_file_logged(marker);
        if let Err(err) = self.set_state(InstallerState::Ready) {
            error!(error = %err, "Could not force installer state to ready");
        }
    }

    /// Operator override (`force=1`): reopen the lane regardless of what
    /// the store says.
    pub fn reset_state(&self) -> Result<(), CoordinatorError> {
        warn!("Installer state forcibly reset to ready");
        self.set_state(InstallerState::Ready)?;
        Ok(())
    }

    /// Read-only snapshot for the admin API.
    pub fn status(&self) -> Result<DeployerStatus, CoordinatorError> {
        Ok(DeployerStatus {
            server_name: self.config.server_name.clone(),
            state: self.state()?,
            pending_packages: self.pending_packages()?.len(),
            post_steps_pending: self.record_exists(),
        })
    }

    pub fn record_path(&self) -> PathBuf {
        self.config.package_source.join(POST_STEP_RECORD_FILE)
    }

    fn record_exists(&self) -> bool {
        self.record_path().exists()
    }

    fn state(&self) -> Result<InstallerState, StateStoreError> {
        self.store.installer_state(&self.config.server_name)
    }

    fn set_state(&self, next: InstallerState) -> Result<(), StateStoreError> {
        self.store
            .set_installer_state(&self.config.server_name, next)?;
        info!(state = %next, "Installer state set");
        Ok(())
    }

    /// Pending packages in processing order (lexicographic file name).
    fn pending_packages(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut packages = Vec::new();
        for entry in fs::read_dir(&self.config.package_source)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == PACKAGE_EXT) {
                packages.push(path);
            }
        }
        packages.sort();
        Ok(packages)
    }

    async fn process_package(
        &self,
        package: &Path,
        logger: &InstallLogger,
    ) -> PackageDisposition {
        let (disposition, artifacts) = self.install_package(package, logger).await;
        self.persist_artifacts(package, &artifacts, logger);
        disposition
    }

    async fn install_package(
        &self,
        package: &Path,
        logger: &InstallLogger,
    ) -> (PackageDisposition, InstallArtifacts) {
        let package_name = display_name(package);
        let mut artifacts = InstallArtifacts::default();

        info!(package = %package_name, "Installing package");

        let applied = match self.backend.apply(package, logger).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(package = %package_name, error = %err, "Package apply failed");
                artifacts.entries = err.entries;
                artifacts.history_path = err.history_path;
                artifacts.status = Some(InstallStatus::Fail);
                schedule_quarantine(package.to_path_buf(), self.config.quarantine_delay);
                return (PackageDisposition::Failed, artifacts);
            }
        };
        artifacts.history_path = Some(applied.history_path.clone());
        artifacts.entries = applied.entries;

        if self.config.update_config_files {
            if let Err(err) = self.replace_changed_configs(package) {
                error!(package = %package_name, error = %err, "Config replacement failed");
                artifacts.status = Some(InstallStatus::Fail);
                schedule_quarantine(package.to_path_buf(), self.config.quarantine_delay);
                return (PackageDisposition::Failed, artifacts);
            }
        }

        // Settle window: let the apply's file-system side effects stop
        // moving before deciding how to finish.
        tokio::time::sleep(self.config.settle_delay).await;

        if self.shutdown.is_set() {
            info!(package = %package_name, "Shutdown observed after apply, deferring post-steps");
            if let Err(err) = self.defer_post_steps(package, &applied.history_path) {
                error!(package = %package_name, error = %err, "Could not persist deferred post-step record");
                artifacts.status = Some(InstallStatus::Fail);
                schedule_quarantine(package.to_path_buf(), self.config.quarantine_delay);
                return (PackageDisposition::DeferralFailed, artifacts);
            }
            if let Some(target) = &self.config.restart_target {
                restart::request_restart(target).await;
            }
            return (PackageDisposition::Deferred, artifacts);
        }

        if let Err(err) = self.set_state(InstallerState::InstallingPostSteps) {
            // The lane is still held; this transition is observability only.
            warn!(error = %err, "Could not record post-step transition");
        }

        match self
            .backend
            .run_post_steps(package, &applied.history_path, logger)
            .await
        {
            Ok(()) => {
                self.archive_package(package, &applied.history_path);
                artifacts.status = Some(InstallStatus::Success);
                if let Err(err) = self.set_state(InstallerState::InstallingPackage) {
                    warn!(error = %err, "Could not record install transition");
                }
                info!(package = %package_name, "Package installed");
                (PackageDisposition::Installed, artifacts)
            }
            Err(err) => {
                error!(package = %package_name, error = %err, "Post-steps failed");
                artifacts.entries.extend(err.entries);
                artifacts.status = Some(InstallStatus::Fail);
                schedule_quarantine(package.to_path_buf(), self.config.quarantine_delay);
                (PackageDisposition::Failed, artifacts)
            }
        }
    }

    /// Write the audit trail for one package: install log, structured
    /// entries, and (for terminal outcomes) the completion notification.
    /// All best-effort; a failed install must still leave whatever can be
    /// written.
    fn persist_artifacts(
        &self,
        package: &Path,
        artifacts: &InstallArtifacts,
        logger: &InstallLogger,
    ) {
        let history = artifacts
            .history_path
            .clone()
            .unwrap_or_else(|| fallback_history_dir(&self.config.history_root));

        if let Err(err) = fs::create_dir_all(&history) {
            warn!(history = %history.display(), error = %err, "Could not create history directory");
        }

        let lines = logger.captured_lines();
        if let Err(err) = logger.write_messages(&history.join(INSTALL_LOG_FILE)) {
            warn!(history = %history.display(), error = %err, "Could not write install log");
        }

        match serde_json::to_string_pretty(&artifacts.entries) {
            Ok(body) => {
                if let Err(err) = fs::write(history.join(MESSAGES_FILE), body) {
                    warn!(history = %history.display(), error = %err, "Could not write messages file");
                }
            }
            Err(err) => warn!(error = %err, "Could not serialize installer entries"),
        }

        if let Some(status) = artifacts.status {
            let notification = CompletionNotification {
                status,
                server_name: self.config.server_name.clone(),
                deploy_history_path: history.display().to_string(),
                log_lines: (status == InstallStatus::Fail).then_some(lines),
            };
            notify::write_notification(&notify::notification_path(package), &notification);
        }
    }

    /// Post-steps are owed to a future startup: hold the lane and persist
    /// everything the next process needs to finish this package.
    fn defer_post_steps(&self, package: &Path, history: &Path) -> Result<(), CoordinatorError> {
        self.set_state(InstallerState::WaitingForPostSteps)?;

        let descriptor = PostStepDescriptor {
            post_step_package_filename: package.to_path_buf(),
            history_path: history.to_path_buf(),
            result_file_name: notify::notification_path(package),
        };
        let record_path = self.record_path();
        let body = serde_json::to_string_pretty(&descriptor)?;
        fs::write(&record_path, body)?;

        info!(
            record = %record_path.display(),
            package = %package.display(),
            "Deferred post-step record written"
        );
        Ok(())
    }

    /// Swap package-suffixed config files into place: `app.conf.<stem>`
    /// replaces `app.conf`, with the live file kept as a timestamped
    /// backup.
    fn replace_changed_configs(&self, package: &Path) -> std::io::Result<()> {
        let Some(stem) = package.file_stem().and_then(|s| s.to_str()) else {
            return Ok(());
        };

        let mut staged = Vec::new();
        collect_suffixed_files(
            &self.config.app_config_dir,
            &format!(".conf.{stem}"),
            &mut staged,
        )?;

        for staged_file in staged {
            let Some(name) = staged_file.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(live_name) = name.strip_suffix(&format!(".{stem}")) else {
                continue;
            };
            let live = staged_file.with_file_name(live_name);

            if live.exists() {
                let backup = staged_file
                    .with_file_name(format!("{name}.backup{}", Utc::now().format(TIMESTAMP_FMT)));
                fs::rename(&live, &backup)?;
                info!(file = %live.display(), backup = %backup.display(), "Live config backed up");
            }

            fs::copy(&staged_file, &live)?;
            info!(file = %live.display(), "Config file replaced from package");

            if let Err(err) = fs::remove_file(&staged_file) {
                // Something may still hold the staged copy; it gets another
                // chance with the next package.
                warn!(file = %staged_file.display(), error = %err, "Could not delete staged config file");
            }
        }
        Ok(())
    }

    /// Move a fully installed package into its history directory so the
    /// drop folder drains into the audit trail.
    fn archive_package(&self, package: &Path, history: &Path) {
        let Some(name) = package.file_name() else {
            return;
        };
        let target = history.join(name);

        // rename fails across mount points; fall back to copy + delete.
        let moved = fs::rename(package, &target)
            .or_else(|_| fs::copy(package, &target).and_then(|_| fs::remove_file(package)));

        match moved {
            Ok(()) => info!(package = %package.display(), history = %history.display(), "Package archived to history"),
            Err(err) => {
                warn!(package = %package.display(), error = %err, "Could not archive package, it will be reprocessed");
            }
        }
    }
}

fn display_name(package: &Path) -> String {
    package
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| package.display().to_string())
}

/// History directory synthesized when a failing backend never reported one.
fn fallback_history_dir(root: &Path) -> PathBuf {
    root.join(format!("upgrade-failure-{}", Utc::now().format(TIMESTAMP_FMT)))
}

fn quarantine_target(package: &Path, stamp: &str) -> PathBuf {
    let name = package
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    package.with_file_name(format!("{name}.error_{stamp}"))
}

fn try_quarantine(package: &Path) -> bool {
    let stamp = Utc::now().format(TIMESTAMP_FMT).to_string();
    let target = quarantine_target(package, &stamp);
    match fs::rename(package, &target) {
        Ok(()) => {
            info!(package = %package.display(), target = %target.display(), "Failed package quarantined");
            true
        }
        Err(err) => {
            debug!(package = %package.display(), error = %err, "Quarantine rename attempt failed");
            false
        }
    }
}

/// Rename a failed package out of the pending set so it is not reprocessed.
///
/// The backend may still hold the file, so the rename runs detached after a
/// short wait, with a single retry. A package that cannot be renamed stays
/// put for manual inspection.
fn schedule_quarantine(package: PathBuf, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if try_quarantine(&package) {
            return;
        }
        tokio::time::sleep(delay * 4).await;
        if !try_quarantine(&package) {
            warn!(package = %package.display(), "Could not quarantine failed package, leaving it in place");
        }
    });
}

fn collect_suffixed_files(dir: &Path, suffix: &str, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_suffixed_files(&path, suffix, out)?;
        } else if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(suffix))
        {
            out.push(path);
        }
    }
    Ok(())
}

fn remove_file_logged(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        warn!(path = %path.display(), error = %err, "Could not remove file");
    }
}
