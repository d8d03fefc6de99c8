//! Install-time log capture.
//!
//! The installer backend writes progress through [`InstallSink`] so one
//! run's output can be buffered, flushed to the install history as
//! `Install.log`, and replayed into a failure notification. Everything
//! recorded here is also forwarded to the process log immediately.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use gantry_types::EntryLevel;
use tracing::{debug, error, info, warn};

/// Sink for installer progress output.
pub trait InstallSink: Send + Sync {
    fn record(&self, level: EntryLevel, message: &str);

    fn debug(&self, message: &str) {
        self.record(EntryLevel::Debug, message);
    }

    fn info(&self, message: &str) {
        self.record(EntryLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.record(EntryLevel::Warn, message);
    }

    fn error(&self, message: &str) {
        self.record(EntryLevel::Error, message);
    }

    fn fatal(&self, message: &str) {
        self.record(EntryLevel::Fatal, message);
    }
}

/// Buffering sink constructed once per coordinator run.
///
/// `write_messages` drains the buffer, so a run that flushes after each
/// package leaves every history directory with only that package's lines.
#[derive(Default)]
pub struct InstallLogger {
    lines: Mutex<Vec<String>>,
}

impl InstallLogger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lines(&self) -> MutexGuard<'_, Vec<String>> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the lines buffered since the last flush.
    pub fn captured_lines(&self) -> Vec<String> {
        self.lines().clone()
    }

    /// Append the buffered lines to `log_file` and clear the buffer.
    ///
    /// The parent directory is created if needed; a synthesized failure
    /// history may not exist yet.
    pub fn write_messages(&self, log_file: &Path) -> std::io::Result<()> {
        let lines = std::mem::take(&mut *self.lines());
        if lines.is_empty() {
            return Ok(());
        }

        if let Some(parent) = log_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new().create(true).append(true).open(log_file)?;
        for line in &lines {
            writeln!(file, "{line}")?;
        }
        Ok(())
    }
}

impl InstallSink for InstallLogger {
    fn record(&self, level: EntryLevel, message: &str) {
        match level {
            EntryLevel::Debug => debug!(target: "install", "{message}"),
            EntryLevel::Info => info!(target: "install", "{message}"),
            EntryLevel::Warn => warn!(target: "install", "{message}"),
            EntryLevel::Error => error!(target: "install", "{message}"),
            EntryLevel::Fatal => error!(target: "install", fatal = true, "{message}"),
        }

        let line = format!(
            "{} [{}] {}",
            Utc::now().format("%Y-%m-%d %H:%M:%S"),
            level,
            message
        );
        self.lines().push(line);
    }
}
