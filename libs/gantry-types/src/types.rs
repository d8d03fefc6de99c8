//! Wire types for the deployer surface.
//!
//! Two of these formats are fixed by external consumers and keep their
//! camelCase field spelling: the completion notification (read by deployment
//! monitoring) and the deferred post-step record (written by one server
//! process, read by the next). Everything else follows the platform's
//! snake_case convention.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Installer state
// =============================================================================

/// Persisted coordinator state, one value per machine identity.
///
/// Stored as an integer in the shared state store; absence of the key reads
/// as `Ready`. Only the coordinator mutates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallerState {
    /// No install in progress; a new run may start.
    Ready,
    /// A package-processing loop is active on this machine.
    InstallingPackage,
    /// A shutdown interrupted a run; post-steps are owed to the next startup.
    WaitingForPostSteps,
    /// Post-install steps (inline or deferred) are executing.
    InstallingPostSteps,
}

impl InstallerState {
    /// Integer encoding used by the shared state store.
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Ready => 0,
            Self::InstallingPackage => 1,
            Self::WaitingForPostSteps => 2,
            Self::InstallingPostSteps => 3,
        }
    }

    /// Decode a stored value. Returns `None` for values no known version
    /// ever wrote; callers decide how to recover.
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Ready),
            1 => Some(Self::InstallingPackage),
            2 => Some(Self::WaitingForPostSteps),
            3 => Some(Self::InstallingPostSteps),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::InstallingPackage => "installing_package",
            Self::WaitingForPostSteps => "waiting_for_post_steps",
            Self::InstallingPostSteps => "installing_post_steps",
        }
    }
}

impl std::fmt::Display for InstallerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Install outcome and log entries
// =============================================================================

/// Terminal outcome of one package install.
///
/// The wire strings are exactly `"Success"` and `"Fail"`; monitoring
/// systems match on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstallStatus {
    Success,
    Fail,
}

/// Severity of a structured installer log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryLevel {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl EntryLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Fatal => "fatal",
        }
    }
}

impl std::fmt::Display for EntryLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structured log entry reported by the installer backend.
///
/// Persisted as an array to `messages.json` under the install history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: EntryLevel,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: EntryLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        }
    }
}

// =============================================================================
// Completion notification
// =============================================================================

/// Per-package result file written next to the processed package
/// (`<package-basename>.json`).
///
/// Write-once, consumed by external monitoring, never read back by the
/// deployer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionNotification {
    pub status: InstallStatus,
    pub server_name: String,
    pub deploy_history_path: String,
    /// Captured installer log lines, included on failure so monitoring can
    /// show the cause without shell access to the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_lines: Option<Vec<String>>,
}

// =============================================================================
// Deferred post-step record
// =============================================================================

/// Details needed to finish a package's post-install steps after a restart.
///
/// Held in memory during a run; serialized to the package source as the
/// deferred post-step record only when a shutdown interrupts the run between
/// package-apply and post-step execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostStepDescriptor {
    /// The package whose post-steps are owed.
    pub post_step_package_filename: PathBuf,
    /// Install history directory the apply step produced.
    pub history_path: PathBuf,
    /// Where the completion notification for this package must be written.
    pub result_file_name: PathBuf,
}

// =============================================================================
// Admin API payloads
// =============================================================================

/// Outcome of one coordinator invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// The entry guard rejected the run; nothing was touched.
    Skipped,
    /// Every pending package was processed.
    Completed,
    /// A shutdown interrupted the run; post-steps were deferred.
    Deferred,
    /// A shutdown was observed before the next package was touched.
    Aborted,
    /// A package failed and blocked the queue.
    Failed,
}

/// Report returned by a synchronous run and logged after a background one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Package file names installed by this run, in processing order.
    pub installed: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_package: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deferred_package: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

impl RunReport {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            outcome: RunOutcome::Skipped,
            installed: Vec::new(),
            failed_package: None,
            deferred_package: None,
            skip_reason: Some(reason.into()),
        }
    }
}

/// Response body for `POST /v1/run`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResponse {
    /// True when the run was handed to a background worker; the report then
    /// arrives in the server log instead of this response.
    pub dispatched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<RunReport>,
}

/// Read-only deployer status (`GET /v1/state`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployerStatus {
    pub server_name: String,
    pub state: InstallerState,
    pub pending_packages: usize,
    /// True when a deferred post-step record exists in the package source.
    pub post_steps_pending: bool,
}
