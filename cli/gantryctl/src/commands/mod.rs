//! CLI commands.

mod run;
mod status;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::client::ApiClient;
use crate::output::OutputFormat;

/// gantry CLI - Trigger and inspect package deployments.
#[derive(Debug, Parser)]
#[command(name = "gantry")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Admin API address of the deployment daemon.
    #[arg(
        long,
        global = true,
        env = "GANTRY_ADDR",
        default_value = "http://127.0.0.1:8745"
    )]
    addr: String,

    /// Output format (text or json).
    #[arg(long, global = true, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Trigger an install run.
    Run(run::RunCommand),

    /// Show deployer state and queue depth.
    Status(status::StatusCommand),

    /// Show CLI version.
    Version,
}

impl Cli {
    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        let format = match self.format.as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Text,
        };

        let ctx = CommandContext {
            client: ApiClient::new(&self.addr)?,
            format,
        };

        match self.command {
            Commands::Run(cmd) => cmd.run(ctx).await,
            Commands::Status(cmd) => cmd.run(ctx).await,
            Commands::Version => {
                println!("gantry {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
        }
    }
}

/// Shared command context.
pub struct CommandContext {
    pub client: ApiClient,
    pub format: OutputFormat,
}
