//! Configuration for the deployment daemon.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// How the daemon asks the host process to restart after deferring
/// post-steps.
#[derive(Debug, Clone)]
pub enum RestartTarget {
    /// Short-timeout GET against the host's own address.
    Url(String),
    /// Touch a file watched by the host's supervisor.
    TouchFile(PathBuf),
}

/// Deployment daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Machine identity; keys the shared installer state and appears in
    /// completion notifications.
    pub server_name: String,

    /// Drop folder scanned for `*.update` packages.
    pub package_source: PathBuf,

    /// Root for synthesized history directories when the backend never
    /// reported one.
    pub history_root: PathBuf,

    /// SQLite file backing the shared installer state.
    pub state_db: PathBuf,

    /// Admin API listen address.
    pub listen_addr: SocketAddr,

    /// Restart trigger fired after post-steps are deferred; `None` leaves
    /// the restart to the host's own schedule.
    pub restart_target: Option<RestartTarget>,

    /// Marker consumed at startup; its presence means the previous process
    /// died without finishing a run.
    pub restart_marker: PathBuf,

    /// Replace live configuration files from package-suffixed copies after
    /// a successful apply.
    pub update_config_files: bool,

    /// Configuration area scanned for package-suffixed files.
    pub app_config_dir: PathBuf,

    /// Settle window between package-apply and the post-step decision.
    pub settle_delay: Duration,

    /// Wait before the first quarantine-rename attempt, and again before
    /// its single retry.
    pub quarantine_delay: Duration,

    /// External installer program; the mock backend is used when unset.
    pub backend_cmd: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        // Machine identity falls back to the hostname so multi-instance
        // deployments arbitrate correctly without explicit configuration.
        let server_name = std::env::var("GANTRY_SERVER_NAME")
            .or_else(|_| std::env::var("HOSTNAME"))
            .unwrap_or_else(|_| "localhost".to_string());

        let package_source = PathBuf::from(
            std::env::var("GANTRY_PACKAGE_SOURCE")
                .unwrap_or_else(|_| "/var/lib/gantry/packages".to_string()),
        );

        let history_root = PathBuf::from(
            std::env::var("GANTRY_HISTORY_ROOT")
                .unwrap_or_else(|_| "/var/lib/gantry/history".to_string()),
        );

        let state_db = PathBuf::from(
            std::env::var("GANTRY_STATE_DB")
                .unwrap_or_else(|_| "/var/lib/gantry/state.db".to_string()),
        );

        let listen_addr = std::env::var("GANTRY_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8745".to_string())
            .parse()
            .context("invalid GANTRY_LISTEN_ADDR")?;

        // A restart URL wins over a touch file when both are set.
        let restart_target = match std::env::var("GANTRY_RESTART_URL") {
            Ok(url) => Some(RestartTarget::Url(url)),
            Err(_) => std::env::var("GANTRY_RESTART_TOUCH_FILE")
                .ok()
                .map(|p| RestartTarget::TouchFile(PathBuf::from(p))),
        };

        let restart_marker = std::env::var("GANTRY_RESTART_MARKER")
            .map(PathBuf::from)
            .unwrap_or_else(|_| package_source.join("restart.marker"));

        let update_config_files = std::env::var("GANTRY_UPDATE_CONFIG_FILES")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let app_config_dir = PathBuf::from(
            std::env::var("GANTRY_APP_CONFIG_DIR")
                .unwrap_or_else(|_| "/etc/gantry/conf.d".to_string()),
        );

        let settle_delay = Duration::from_millis(
            std::env::var("GANTRY_SETTLE_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(4000),
        );

        let quarantine_delay = Duration::from_millis(
            std::env::var("GANTRY_QUARANTINE_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(500),
        );

        let backend_cmd = std::env::var("GANTRY_BACKEND_CMD").ok().map(PathBuf::from);

        let log_level = std::env::var("GANTRY_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            server_name,
            package_source,
            history_root,
            state_db,
            listen_addr,
            restart_target,
            restart_marker,
            update_config_files,
            app_config_dir,
            settle_delay,
            quarantine_delay,
            backend_cmd,
            log_level,
        })
    }
}
