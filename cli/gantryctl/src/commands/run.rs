//! Run command - trigger an install run on the daemon.
//!
//! Dispatches to a background worker by default; `--wait` runs it
//! synchronously and prints the report. `--force` resets persisted
//! installer state first, for recovering a lane a dead process left held.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use gantry_types::{RunOutcome, RunResponse};

use crate::output::{print_json, OutputFormat};

use super::CommandContext;

#[derive(Debug, Args)]
pub struct RunCommand {
    /// Reset persisted installer state before the run.
    #[arg(long)]
    force: bool,

    /// Wait for the run to finish and print its report.
    #[arg(long)]
    wait: bool,
}

impl RunCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let mut params = Vec::new();
        if self.force {
            params.push("force=1");
        }
        if self.wait {
            params.push("synchronous=1");
        }
        let path = if params.is_empty() {
            "/v1/run".to_string()
        } else {
            format!("/v1/run?{}", params.join("&"))
        };

        let response: RunResponse = ctx.client.post(&path).await?;

        if let OutputFormat::Json = ctx.format {
            print_json(&response);
            return Ok(());
        }

        let Some(report) = response.report else {
            println!(
                "{} install run dispatched, the report lands in the daemon log",
                "ok:".green().bold()
            );
            return Ok(());
        };

        match report.outcome {
            RunOutcome::Completed => println!(
                "{} {} package(s) installed",
                "ok:".green().bold(),
                report.installed.len()
            ),
            RunOutcome::Skipped => println!(
                "{} run skipped: {}",
                "warning:".yellow().bold(),
                report.skip_reason.unwrap_or_default()
            ),
            RunOutcome::Deferred => println!(
                "{} post-steps deferred for {}, finish happens at next startup",
                "warning:".yellow().bold(),
                report.deferred_package.unwrap_or_default()
            ),
            RunOutcome::Aborted => {
                println!("{} run aborted by shutdown", "warning:".yellow().bold())
            }
            RunOutcome::Failed => println!(
                "{} {} failed, queue is blocked until resolved",
                "failed:".red().bold(),
                report.failed_package.unwrap_or_default()
            ),
        }

        for package in &report.installed {
            println!("  installed {package}");
        }
        Ok(())
    }
}
