//! CLI interface for riskcast
//!
//! Provides subcommands for:
//! - `run`: Run a simulation over a CSV trade log
//! - `config`: Show the loaded configuration

mod run;

pub use run::RunArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "riskcast")]
#[command(about = "Monte Carlo trade-resampling risk simulator for trading accounts")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a simulation over a CSV trade log
    Run(RunArgs),
    /// Show the loaded configuration
    Config,
}
