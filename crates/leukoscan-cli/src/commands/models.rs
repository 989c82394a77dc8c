//! Models command - manage ML models.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use clap::{Args, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use leukoscan_adapters::models::{
    ensure_models_with_progress, list_models as adapter_list_models, models_dir, set_models_dir,
    ProgressCallback, MODELS,
};

/// Arguments for the models command
#[derive(Args)]
pub struct ModelsArgs {
    /// Custom models directory
    #[arg(long, value_name = "DIR", global = true)]
    pub models_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: ModelsCommand,
}

/// Models subcommands
#[derive(Subcommand)]
pub enum ModelsCommand {
    /// Download missing models
    Fetch {
        /// Base URL the model files are served from
        #[arg(long, value_name = "URL")]
        from: String,
    },
    /// List installed models
    List,
    /// Print model directory path
    Path,
}

/// Run the models command.
pub fn run(args: &ModelsArgs) -> Result<()> {
    if let Some(ref dir) = args.models_dir {
        set_models_dir(Some(dir.clone()));
    }

    match args.command {
        ModelsCommand::Fetch { ref from } => fetch_models(from),
        ModelsCommand::List => {
            list_models();
            Ok(())
        }
        ModelsCommand::Path => {
            println!("{}", models_dir().display());
            Ok(())
        }
    }
}

fn fetch_models(base_url: &str) -> Result<()> {
    let pb = Arc::new(ProgressBar::new(0));
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta}) {msg}")
            .map_err(|e| anyhow::anyhow!("Invalid progress template: {e}"))?
            .progress_chars("#>-"),
    );

    let current_model: Arc<Mutex<String>> = Arc::new(Mutex::new(String::new()));
    let pb_clone = Arc::clone(&pb);
    let model_clone = Arc::clone(&current_model);

    let progress: ProgressCallback =
        Box::new(move |name: &str, downloaded: u64, total: Option<u64>| {
            let is_new_model = {
                let mut current = model_clone.lock().unwrap_or_else(PoisonError::into_inner);
                if *current == name {
                    false
                } else {
                    *current = name.to_string();
                    true
                }
            };
            if is_new_model {
                if let Some(t) = total {
                    pb_clone.set_length(t);
                }
                pb_clone.set_message(name.to_string());
            }
            pb_clone.set_position(downloaded);
        });

    ensure_models_with_progress(base_url, Some(&progress))?;

    pb.finish_with_message("All models available");
    Ok(())
}

fn list_models() {
    let models = adapter_list_models();
    let dir = models_dir();

    println!("Models directory: {}", dir.display());
    println!();

    for (name, installed) in &models {
        let status = if *installed { "✓" } else { "✗" };
        let info = MODELS.iter().find(|m| m.name == name);
        let filename = info.map_or("unknown", |m| m.filename);
        println!("  {status} {name} ({filename})");
    }

    println!();
    let installed_count = models.iter().filter(|(_, installed)| *installed).count();
    println!("{}/{} models installed", installed_count, models.len());
}
