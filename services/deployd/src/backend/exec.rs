//! Backend that shells out to an external installer program.
//!
//! Two generations of installer are in the field. Modern ones expose
//! `capabilities`, `apply` and `post-steps` subcommands; legacy ones have a
//! single `install` entry point driven by mode flags. The program is probed
//! exactly once, at startup, and the winning convention is used for every
//! call after that.
//!
//! Contract with the program: progress goes to stderr (forwarded line by
//! line to the install log), and the final result is a JSON object on
//! stdout carrying the history path and structured entries. A failing
//! invocation may still emit that object; whatever parses is preserved so
//! partial results reach the audit trail.

use std::path::{Path, PathBuf};

use anyhow::Context;
use gantry_types::LogEntry;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

use super::{ApplyOutcome, BackendError, InstallerBackend};
use crate::logging::InstallSink;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallingConvention {
    /// `apply` / `post-steps` subcommands.
    Split,
    /// Single `install` entry point with mode flags.
    LegacySingle,
}

/// Result object the installer prints on stdout.
#[derive(Debug, Deserialize)]
struct InstallerResult {
    history_path: PathBuf,
    #[serde(default)]
    entries: Vec<LogEntry>,
}

#[derive(Debug, Deserialize)]
struct PostStepsResult {
    #[serde(default)]
    entries: Vec<LogEntry>,
}

pub struct ExecBackend {
    program: PathBuf,
    history_root: PathBuf,
    convention: CallingConvention,
}

impl ExecBackend {
    /// Probe the installer program and fix the calling convention.
    ///
    /// Legacy installers do not know the `capabilities` subcommand and exit
    /// non-zero; that failure is the detection, not an error. A program
    /// that cannot be spawned at all is a configuration problem and fails
    /// startup.
    pub async fn negotiate(program: &Path, history_root: &Path) -> anyhow::Result<Self> {
        let output = Command::new(program)
            .arg("capabilities")
            .output()
            .await
            .with_context(|| format!("cannot run installer program {}", program.display()))?;

        let convention = if output.status.success() {
            parse_capabilities(&String::from_utf8_lossy(&output.stdout))
        } else {
            debug!(
                program = %program.display(),
                status = %output.status,
                "Capabilities probe rejected, assuming legacy installer"
            );
            CallingConvention::LegacySingle
        };

        info!(
            program = %program.display(),
            convention = ?convention,
            "Installer backend negotiated"
        );

        Ok(Self {
            program: program.to_path_buf(),
            history_root: history_root.to_path_buf(),
            convention,
        })
    }

    fn apply_command(&self, package: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        match self.convention {
            CallingConvention::Split => {
                cmd.arg("apply").arg(package);
            }
            CallingConvention::LegacySingle => {
                cmd.arg("install").arg(package).arg("--skip-post-steps");
            }
        }
        cmd.arg("--history-root").arg(&self.history_root);
        cmd
    }

    fn post_steps_command(&self, package: &Path, history_path: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        match self.convention {
            CallingConvention::Split => {
                cmd.arg("post-steps").arg(package);
            }
            CallingConvention::LegacySingle => {
                cmd.arg("install").arg(package).arg("--post-steps-only");
            }
        }
        cmd.arg("--history").arg(history_path);
        cmd
    }
}

fn parse_capabilities(stdout: &str) -> CallingConvention {
    if stdout.lines().any(|line| line.trim() == "post-steps") {
        CallingConvention::Split
    } else {
        CallingConvention::LegacySingle
    }
}

fn forward_stderr(stderr: &[u8], log: &dyn InstallSink) {
    for line in String::from_utf8_lossy(stderr).lines() {
        if !line.trim().is_empty() {
            log.info(line);
        }
    }
}

#[async_trait]
impl InstallerBackend for ExecBackend {
    async fn apply(
        &self,
        package: &Path,
        log: &dyn InstallSink,
    ) -> Result<ApplyOutcome, BackendError> {
        let output = self
            .apply_command(package)
            .output()
            .await
            .map_err(|err| BackendError::new(format!("failed to launch installer: {err}")))?;

        forward_stderr(&output.stderr, log);
        let parsed: Option<InstallerResult> = serde_json::from_slice(&output.stdout).ok();

        if output.status.success() {
            let result = parsed.ok_or_else(|| {
                BackendError::new("installer exited cleanly but produced no result object")
            })?;
            return Ok(ApplyOutcome {
                history_path: result.history_path,
                entries: result.entries,
            });
        }

        let mut err = BackendError::new(format!("installer apply failed: {}", output.status));
        if let Some(result) = parsed {
            err = err
                .with_entries(result.entries)
                .with_history(result.history_path);
        }
        Err(err)
    }

    async fn run_post_steps(
        &self,
        package: &Path,
        history_path: &Path,
        log: &dyn InstallSink,
    ) -> Result<(), BackendError> {
        let output = self
            .post_steps_command(package, history_path)
            .output()
            .await
            .map_err(|err| BackendError::new(format!("failed to launch installer: {err}")))?;

        forward_stderr(&output.stderr, log);

        if output.status.success() {
            return Ok(());
        }

        let mut err = BackendError::new(format!("installer post-steps failed: {}", output.status));
        if let Ok(result) = serde_json::from_slice::<PostStepsResult>(&output.stdout) {
            err = err.with_entries(result.entries);
        }
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_with_post_steps_selects_split() {
        let stdout = "apply\npost-steps\nverify\n";
        assert_eq!(parse_capabilities(stdout), CallingConvention::Split);
    }

    #[test]
    fn test_capabilities_without_post_steps_selects_legacy() {
        assert_eq!(
            parse_capabilities("install\n"),
            CallingConvention::LegacySingle
        );
        assert_eq!(parse_capabilities(""), CallingConvention::LegacySingle);
    }

    #[test]
    fn test_partial_result_still_parses() {
        // Entries are optional in the result object.
        let result: InstallerResult =
            serde_json::from_str(r#"{"history_path": "/data/history/a"}"#).unwrap();
        assert_eq!(result.history_path, PathBuf::from("/data/history/a"));
        assert!(result.entries.is_empty());
    }
}
