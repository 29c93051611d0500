//! Models command - manage model assets.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use clap::{Args, Subcommand};
use eyestate_adapters::default_models_dir;
use eyestate_adapters::models::{fetch_models_with_progress, list_models, ProgressCallback};
use indicatif::{ProgressBar, ProgressStyle};

use super::ExitCode;
use crate::config::AppConfig;

/// Arguments for the models command
#[derive(Args)]
pub struct ModelsArgs {
    /// Custom models directory (overrides default and config)
    #[arg(long, value_name = "DIR", global = true)]
    pub models_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: ModelsCommand,
}

/// Models subcommands
#[derive(Subcommand)]
pub enum ModelsCommand {
    /// Download missing model assets
    Fetch {
        /// Base URL the assets are served from (overrides config)
        #[arg(long, value_name = "URL")]
        base_url: Option<String>,
    },
    /// List installed model assets
    List,
    /// Print model directory path
    Path,
}

/// Run the models command.
pub fn run(args: &ModelsArgs, config: &AppConfig) -> Result<ExitCode> {
    let dir = args
        .models_dir
        .clone()
        .or_else(|| config.models.dir.clone())
        .unwrap_or_else(default_models_dir);

    match args.command {
        ModelsCommand::Fetch { ref base_url } => {
            let Some(base_url) = base_url.clone().or_else(|| config.models.base_url.clone())
            else {
                anyhow::bail!(
                    "No model source configured. Pass --base-url or set models.base_url in config."
                );
            };
            fetch(&dir, &base_url)?;
        }
        ModelsCommand::List => print_list(&dir),
        ModelsCommand::Path => println!("{}", dir.display()),
    }
    Ok(ExitCode::Success)
}

fn fetch(dir: &std::path::Path, base_url: &str) -> Result<()> {
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

    fetch_models_with_progress(dir, base_url, Some(&progress))?;

    pb.finish_with_message("All models downloaded");
    Ok(())
}

fn print_list(dir: &std::path::Path) {
    let models = list_models(dir);

    println!("Models directory: {}", dir.display());
    println!();

    for (info, installed) in &models {
        let status = if *installed { "✓" } else { "✗" };
        println!("  {status} {} ({})", info.name, info.filename);
    }

    println!();
    let installed_count = models.iter().filter(|(_, installed)| *installed).count();
    println!("{}/{} models installed", installed_count, models.len());
}
