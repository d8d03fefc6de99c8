//! Mock installer backend for development and tests.
//!
//! Applies nothing; it creates a real history directory and reports
//! scripted outcomes per package so coordinator behavior can be exercised
//! without an installer program. The post-apply hook runs between apply and
//! the coordinator's shutdown re-check, which is exactly where a service
//! stop lands in production.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use gantry_types::{EntryLevel, LogEntry};

use super::{ApplyOutcome, BackendError, InstallerBackend};
use crate::logging::InstallSink;

/// Scripted result for one package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockOutcome {
    Succeed,
    /// Fail before a history directory exists.
    FailEarly,
    /// Fail after creating the history directory.
    FailApply,
    /// Apply succeeds, post-steps fail.
    FailPostSteps,
}

type PostApplyHook = dyn Fn(&Path) + Send + Sync;

pub struct MockBackend {
    history_root: PathBuf,
    outcomes: HashMap<String, MockOutcome>,
    apply_delay: Duration,
    post_step_delay: Duration,
    post_apply_hook: Option<Box<PostApplyHook>>,
    apply_calls: AtomicU64,
    post_step_calls: AtomicU64,
}

impl MockBackend {
    pub fn new(history_root: impl Into<PathBuf>) -> Self {
        Self {
            history_root: history_root.into(),
            outcomes: HashMap::new(),
            apply_delay: Duration::ZERO,
            post_step_delay: Duration::ZERO,
            post_apply_hook: None,
            apply_calls: AtomicU64::new(0),
            post_step_calls: AtomicU64::new(0),
        }
    }

    /// Script the outcome for a package file name; unscripted packages
    /// succeed.
    pub fn with_outcome(mut self, package_name: &str, outcome: MockOutcome) -> Self {
        self.outcomes.insert(package_name.to_string(), outcome);
        self
    }

    /// Hold each apply open for `delay`, for overlap tests.
    pub fn with_apply_delay(mut self, delay: Duration) -> Self {
        self.apply_delay = delay;
        self
    }

    /// Hold each post-step run open for `delay`, for overlap tests.
    pub fn with_post_step_delay(mut self, delay: Duration) -> Self {
        self.post_step_delay = delay;
        self
    }

    /// Run `hook` after a successful apply, before control returns to the
    /// coordinator.
    pub fn with_post_apply_hook(mut self, hook: impl Fn(&Path) + Send + Sync + 'static) -> Self {
        self.post_apply_hook = Some(Box::new(hook));
        self
    }

    pub fn apply_calls(&self) -> u64 {
        self.apply_calls.load(Ordering::SeqCst)
    }

    pub fn post_step_calls(&self) -> u64 {
        self.post_step_calls.load(Ordering::SeqCst)
    }

    fn outcome_for(&self, package: &Path) -> MockOutcome {
        package
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| self.outcomes.get(name).copied())
            .unwrap_or(MockOutcome::Succeed)
    }

    fn history_dir_for(&self, package: &Path) -> PathBuf {
        let stem = package
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "package".to_string());
        self.history_root
            .join(format!("{stem}-{}", Utc::now().format("%Y%m%d%H%M%S%3f")))
    }
}

#[async_trait]
impl InstallerBackend for MockBackend {
    async fn apply(
        &self,
        package: &Path,
        log: &dyn InstallSink,
    ) -> Result<ApplyOutcome, BackendError> {
        self.apply_calls.fetch_add(1, Ordering::SeqCst);

        if !self.apply_delay.is_zero() {
            tokio::time::sleep(self.apply_delay).await;
        }

        let name = package
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match self.outcome_for(package) {
            MockOutcome::FailEarly => {
                log.error(&format!("[mock] refusing {name} before apply"));
                Err(
                    BackendError::new(format!("mock backend refused {name}")).with_entries(vec![
                        LogEntry::new(EntryLevel::Error, format!("refused {name}")),
                    ]),
                )
            }
            MockOutcome::FailApply => {
                let history = self.history_dir_for(package);
                std::fs::create_dir_all(&history)
                    .map_err(|err| BackendError::new(format!("mock history dir: {err}")))?;
                log.error(&format!("[mock] apply of {name} failed"));
                Err(BackendError::new(format!("mock apply of {name} failed"))
                    .with_entries(vec![LogEntry::new(
                        EntryLevel::Error,
                        format!("apply of {name} failed"),
                    )])
                    .with_history(history))
            }
            MockOutcome::Succeed | MockOutcome::FailPostSteps => {
                let history = self.history_dir_for(package);
                std::fs::create_dir_all(&history)
                    .map_err(|err| BackendError::new(format!("mock history dir: {err}")))?;
                log.info(&format!("[mock] applied {name}"));

                if let Some(hook) = &self.post_apply_hook {
                    hook(package);
                }

                Ok(ApplyOutcome {
                    history_path: history,
                    entries: vec![LogEntry::new(EntryLevel::Info, format!("applied {name}"))],
                })
            }
        }
    }

    async fn run_post_steps(
        &self,
        package: &Path,
        _history_path: &Path,
        log: &dyn InstallSink,
    ) -> Result<(), BackendError> {
        self.post_step_calls.fetch_add(1, Ordering::SeqCst);

        if !self.post_step_delay.is_zero() {
            tokio::time::sleep(self.post_step_delay).await;
        }

        let name = package
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match self.outcome_for(package) {
            MockOutcome::FailPostSteps => {
                log.error(&format!("[mock] post-steps of {name} failed"));
                Err(
                    BackendError::new(format!("mock post-steps of {name} failed")).with_entries(
                        vec![LogEntry::new(
                            EntryLevel::Error,
                            format!("post-steps of {name} failed"),
                        )],
                    ),
                )
            }
            _ => {
                log.info(&format!("[mock] ran post-steps of {name}"));
                Ok(())
            }
        }
    }
}
