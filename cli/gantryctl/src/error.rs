//! Error handling and display for the CLI.

use colored::Colorize;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("API error: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl CliError {
    /// Create an API error from response details.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {}", "Error:".red().bold(), err);

    // Check for specific error types and provide hints
    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        match cli_err {
            CliError::Network(_) => {
                eprintln!(
                    "\n{}",
                    "Hint: Is deployd running? Check --addr or GANTRY_ADDR.".yellow()
                );
            }
            CliError::Api { status, .. } if *status == 500 => {
                eprintln!(
                    "\n{}",
                    "Hint: The daemon hit a state-store problem; check its logs.".yellow()
                );
            }
            _ => {}
        }
    }
}
