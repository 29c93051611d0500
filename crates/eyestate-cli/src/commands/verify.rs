//! Verify command - score a directory of eye images.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use eyestate_adapters::FsEyeBundleSource;
use eyestate_core::inference::verify;
use tracing::info;

use super::{ExitCode, ScoringArgs};
use crate::config::AppConfig;
use crate::output::BatchReport;

/// Arguments for the verify command
#[derive(Args, Clone)]
pub struct VerifyArgs {
    /// Directory holding left_0..left_4 and right_0..right_4 images
    pub dir: PathBuf,

    #[command(flatten)]
    pub scoring: ScoringArgs,
}

/// Run the verify command.
pub fn run(args: &VerifyArgs, config: &AppConfig) -> Result<ExitCode> {
    let scoring = args.scoring.clone().with_config(config);
    info!("Verifying eye bundle in {}", args.dir.display());

    let bundle = FsEyeBundleSource::new(&args.dir)
        .load()
        .context("Failed to load eye bundle")?;
    let engine = scoring.load_engine(config)?;

    let batch = verify(&engine, &bundle).context("Verification failed")?;
    let report = BatchReport::new(args.dir.display().to_string(), &batch, engine.labels());
    scoring.print(&report)?;

    Ok(ExitCode::Success)
}
