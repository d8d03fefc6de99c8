//! Status command - show deployer state and queue depth.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use gantry_types::{DeployerStatus, InstallerState};

use crate::output::{print_json, OutputFormat};

use super::CommandContext;

#[derive(Debug, Args)]
pub struct StatusCommand {}

impl StatusCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let status: DeployerStatus = ctx.client.get("/v1/state").await?;

        if let OutputFormat::Json = ctx.format {
            print_json(&status);
            return Ok(());
        }

        let state = if status.state == InstallerState::Ready {
            status.state.to_string().green()
        } else {
            status.state.to_string().yellow()
        };
        println!("server:             {}", status.server_name);
        println!("state:              {state}");
        println!("pending packages:   {}", status.pending_packages);
        println!(
            "post-steps pending: {}",
            if status.post_steps_pending {
                "yes".yellow()
            } else {
                "no".normal()
            }
        );
        Ok(())
    }
}
