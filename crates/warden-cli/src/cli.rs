//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Warden access-control decision gateway
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the decision API
    Serve {
        /// Configuration file
        #[arg(short, long, env = "WARDEN_CONFIG")]
        config: PathBuf,
    },

    /// Load the configuration and build every component without serving
    Validate {
        /// Configuration file
        #[arg(short, long, env = "WARDEN_CONFIG")]
        config: PathBuf,
    },

    /// Probe the health endpoint of a running gateway
    Health {
        /// Base URL of the gateway
        #[arg(short, long, default_value = "http://127.0.0.1:4456")]
        endpoint: String,
    },
}
