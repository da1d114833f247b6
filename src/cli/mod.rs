//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{BricksCommand, HistoryCommand, RunCommand, ValidateCommand};
use std::ffi::OsString;

/// Brick pipeline runner
#[derive(Debug, Parser, Clone)]
#[command(name = "brickrun")]
#[command(version = "0.1.0")]
#[command(about = "Run brick pipelines from mod files", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a mod's pipeline
    Run(RunCommand),

    /// Validate a mod file
    Validate(ValidateCommand),

    /// List registered bricks
    Bricks(BricksCommand),

    /// Show trace history
    History(HistoryCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
