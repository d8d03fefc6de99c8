//! Host restart trigger.
//!
//! Fired after post-steps are deferred so the owed work starts sooner.
//! Strictly best-effort: every failure mode is logged and swallowed, since
//! the deferred record is consumed at whatever startup happens next anyway.

use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::config::RestartTarget;

/// The poke only has to reach the host; a hung response is not worth
/// waiting for.
const REQUEST_TIMEOUT: Duration = Duration::from_millis(500);

/// Ask the host process to restart.
pub async fn request_restart(target: &RestartTarget) {
    match target {
        RestartTarget::Url(url) => request_url(url).await,
        RestartTarget::TouchFile(path) => {
            match std::fs::write(path, Utc::now().to_rfc3339()) {
                Ok(()) => info!(path = %path.display(), "Restart requested via touch file"),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "Could not touch restart file");
                }
            }
        }
    }
}

async fn request_url(url: &str) {
    let client = match reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build() {
        Ok(client) => client,
        Err(err) => {
            warn!(error = %err, "Could not build restart client");
            return;
        }
    };

    // The request itself often dies with the restarting host; either way
    // the poke went out.
    match client.get(url).send().await {
        Ok(response) => info!(url, status = %response.status(), "Restart requested"),
        Err(err) => info!(url, error = %err, "Restart request sent, no usable response"),
    }
}
