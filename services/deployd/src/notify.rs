//! Completion notification files.
//!
//! One JSON file per processed package, written next to where the package
//! was dropped and named after it. External monitoring polls for these;
//! the deployer itself never reads them back. Failures to write are logged
//! and swallowed, a notification must never take an install down.

use std::path::{Path, PathBuf};

use gantry_types::CompletionNotification;
use tracing::{debug, warn};

/// Where the notification for a package lands: `a.update` -> `a.json`.
pub fn notification_path(package: &Path) -> PathBuf {
    package.with_extension("json")
}

/// Serialize and write a notification to `path`.
pub fn write_notification(path: &Path, notification: &CompletionNotification) {
    let body = match serde_json::to_string_pretty(notification) {
        Ok(body) => body,
        Err(err) => {
            warn!(error = %err, "Could not serialize completion notification");
            return;
        }
    };

    match std::fs::write(path, body) {
        Ok(()) => debug!(path = %path.display(), "Completion notification written"),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Could not write completion notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use gantry_types::InstallStatus;

    use super::*;

    #[test]
    fn test_notification_path_replaces_extension() {
        assert_eq!(
            notification_path(Path::new("/drop/a.update")),
            PathBuf::from("/drop/a.json")
        );
        assert_eq!(
            notification_path(Path::new("/drop/site-2.1.0.update")),
            PathBuf::from("/drop/site-2.1.0.json")
        );
    }

    #[test]
    fn test_written_notification_parses_back() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.json");

        let notification = CompletionNotification {
            status: InstallStatus::Success,
            server_name: "web01".to_string(),
            deploy_history_path: "/data/history/a".to_string(),
            log_lines: None,
        };
        write_notification(&path, &notification);

        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: CompletionNotification = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, notification);
    }

    #[test]
    fn test_unwritable_path_is_swallowed() {
        let notification = CompletionNotification {
            status: InstallStatus::Fail,
            server_name: "web01".to_string(),
            deploy_history_path: String::new(),
            log_lines: None,
        };
        // Parent directory does not exist; must not panic or propagate.
        write_notification(Path::new("/nonexistent/dir/a.json"), &notification);
    }
}
