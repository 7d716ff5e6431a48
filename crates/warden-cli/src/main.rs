#![forbid(unsafe_code)]

//! Warden
//!
//! Access-control decision gateway.

use anyhow::Result;
use clap::Parser;
use warden_cli::cli::{Cli, Command};
use warden_cli::commands;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { config } => commands::serve(&config).await,
        Command::Validate { config } => commands::validate(&config),
        Command::Health { endpoint } => commands::health(&endpoint).await,
    }
}
