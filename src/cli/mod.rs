pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "sentinel")]
#[command(about = "Sentinel CLI - startup checks and JWT secret diagnostics")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the startup dependency checks and report")]
    Check {
        #[command(flatten)]
        args: commands::check::CheckArgs,
    },

    #[command(about = "JWT secret resolution and cross-service synchronization")]
    Jwt {
        #[command(subcommand)]
        cmd: commands::jwt::JwtCommands,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Check { args } => commands::check::handle(args, output_format).await,
        Commands::Jwt { cmd } => commands::jwt::handle(cmd, output_format).await,
    }
}
