//! CLI command definitions and handlers.

pub mod models;
pub mod probe;
pub mod run;
pub mod verify;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use eyestate_adapters::{default_models_dir, model_path};
use eyestate_adapters::models::{LABELS, WEIGHTS};
use eyestate_core::inference::{EngineConfig, InferenceEngine, DEFAULT_NUM_CLASSES};
use tracing::debug;

use crate::config::AppConfig;
use crate::output::{BatchReport, JsonOutput};

/// eyestate - capture eye pairs from a camera and score their state
#[derive(Parser)]
#[command(name = "eyestate")]
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
    /// Score a directory of left_N / right_N eye images
    Verify(verify::VerifyArgs),
    /// Stream a still image through the capture pipeline and score one batch
    Run(run::RunArgs),
    /// Pick a capture resolution for a view size
    Probe(probe::ProbeArgs),
    /// Manage model assets
    Models(models::ModelsArgs),
}

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Command completed.
    Success = 0,
    /// The pipeline ran but produced no verified batch.
    NotVerified = 1,
    /// Command failed.
    Error = 2,
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        Self::from(code as u8)
    }
}

/// Output format for results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// JSON Lines (one JSON object per entry)
    #[default]
    Jsonl,
    /// Single JSON document
    Json,
}

/// Arguments shared by commands that load the network and print results.
#[derive(Args, Clone, Default)]
pub struct ScoringArgs {
    /// Custom models directory (overrides default and config)
    #[arg(long, value_name = "DIR")]
    pub models_dir: Option<PathBuf>,

    /// Weight file (overrides the models directory)
    #[arg(long, value_name = "FILE")]
    pub model: Option<PathBuf>,

    /// Labels file (overrides the models directory)
    #[arg(long, value_name = "FILE")]
    pub labels: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Pretty-print JSON output (only affects --format json)
    #[arg(long)]
    pub pretty: bool,
}

impl ScoringArgs {
    /// Apply configuration file values, respecting CLI precedence.
    pub fn with_config(mut self, config: &AppConfig) -> Self {
        if self.models_dir.is_none() {
            self.models_dir.clone_from(&config.models.dir);
        }
        if self.format.is_none() {
            self.format = config
                .output
                .format
                .as_ref()
                .and_then(|s| match s.as_str() {
                    "json" => Some(OutputFormat::Json),
                    "jsonl" => Some(OutputFormat::Jsonl),
                    _ => None,
                });
        }
        if !self.pretty {
            self.pretty = config.output.pretty.unwrap_or(false);
        }
        self
    }

    /// Get output format with fallback to JSONL.
    pub fn format(&self) -> OutputFormat {
        self.format.unwrap_or_default()
    }

    /// Resolved weight and labels paths.
    pub fn model_paths(&self) -> (PathBuf, PathBuf) {
        let dir = self.models_dir.clone().unwrap_or_else(default_models_dir);
        let model = self
            .model
            .clone()
            .or_else(|| model_path(&dir, WEIGHTS))
            .unwrap_or_else(|| dir.join("eye_state.safetensors"));
        let labels = self
            .labels
            .clone()
            .or_else(|| model_path(&dir, LABELS))
            .unwrap_or_else(|| dir.join("labels.txt"));
        (model, labels)
    }

    /// Creates and initializes an engine from the resolved model files.
    pub fn load_engine(&self, config: &AppConfig) -> Result<InferenceEngine> {
        let (model, labels) = self.model_paths();
        if !model.exists() {
            anyhow::bail!(
                "Model not found: {}. Run `eyestate models fetch` or pass --model.",
                model.display()
            );
        }
        debug!("Loading model {} with labels {}", model.display(), labels.display());

        let engine = InferenceEngine::new(EngineConfig {
            num_classes: config.inference.num_classes.unwrap_or(DEFAULT_NUM_CLASSES),
        });
        engine.initialize(&model, &labels)?;
        Ok(engine)
    }

    /// Prints a report in the selected format.
    pub fn print(&self, report: &BatchReport) -> Result<()> {
        let output = JsonOutput::stdout();
        match self.format() {
            OutputFormat::Jsonl => output.write_lines(report),
            OutputFormat::Json => output.write_value(report, self.pretty),
        }
    }
}
