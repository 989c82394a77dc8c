//! Leukoscan CLI - Leukocoria screening for eye photographs.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod output;

use commands::analyze::AnalyzeArgs;
use commands::{Cli, Commands, ExitCode};
use config::AppConfig;

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let exit_code = match cli.command {
        Commands::Analyze(args) => {
            let args = AnalyzeArgs::with_config(args, &AppConfig::load());
            commands::analyze::run(&args).unwrap_or_else(|e| {
                eprintln!("error: {e:#}");
                ExitCode::Error
            })
        }
        Commands::Models(mut args) => {
            if args.models_dir.is_none() {
                args.models_dir = AppConfig::load().models.dir;
            }
            match commands::models::run(&args) {
                Ok(()) => ExitCode::Success,
                Err(e) => {
                    eprintln!("error: {e:#}");
                    ExitCode::Error
                }
            }
        }
    };

    exit_code.into()
}
