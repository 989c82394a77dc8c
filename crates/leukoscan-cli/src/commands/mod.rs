//! CLI command definitions and handlers.

pub mod analyze;
pub mod models;

use clap::{Parser, Subcommand};

/// Leukoscan - Leukocoria screening for eye photographs
#[derive(Parser)]
#[command(name = "leukoscan")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Screen one photograph for leukocoria
    Analyze(analyze::AnalyzeArgs),
    /// Manage ML models
    Models(models::ModelsArgs),
}

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Screening finished and nothing was flagged.
    Success = 0,
    /// At least one eye was flagged.
    LeukocoriaFound = 1,
    /// The image was missing or undecodable.
    InvalidInput = 2,
    /// A detector could not be reached.
    UpstreamUnavailable = 3,
    /// The classifier could not be reached or loaded.
    ClassificationUnavailable = 4,
    /// Anything else.
    Error = 5,
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        Self::from(code as u8)
    }
}
