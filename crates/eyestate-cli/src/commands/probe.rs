//! Probe command - pick a capture resolution and preview transform.

use anyhow::Result;
use clap::Args;
use eyestate_adapters::{SyntheticCamera, SyntheticConfig};
use eyestate_core::camera::{
    configure_transform, CapabilityProber, DisplayTransform, ProbeConfig, ProbeOutcome,
    MINIMUM_PREVIEW_SIZE,
};
use eyestate_core::domain::{DisplayRotation, LensFacing, Orientation, Size};
use image::RgbaImage;
use serde::Serialize;
use tracing::info;

use super::ExitCode;
use crate::config::AppConfig;
use crate::output::JsonOutput;

/// Parse a display rotation given in degrees.
pub fn parse_rotation(s: &str) -> Result<DisplayRotation, String> {
    let degrees: u32 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;
    DisplayRotation::from_degrees(degrees)
        .ok_or_else(|| format!("{degrees} is not one of 0, 90, 180, 270"))
}

/// Parse a lens direction.
pub fn parse_facing(s: &str) -> Result<LensFacing, String> {
    match s {
        "front" => Ok(LensFacing::Front),
        "back" => Ok(LensFacing::Back),
        _ => Err(format!("'{s}' is not 'front' or 'back'")),
    }
}

/// Builds the probe configuration: CLI > config > defaults.
pub fn probe_config(facing: Option<LensFacing>, config: &AppConfig) -> ProbeConfig {
    let facing = facing
        .or_else(|| config.camera.facing.as_deref().and_then(|f| parse_facing(f).ok()))
        .unwrap_or(LensFacing::Front);
    ProbeConfig {
        facing,
        minimum_size: config.camera.minimum_size.unwrap_or(MINIMUM_PREVIEW_SIZE),
        ..ProbeConfig::default()
    }
}

/// Arguments for the probe command
#[derive(Args, Clone)]
pub struct ProbeArgs {
    /// Sizes the device supports (defaults to the synthetic camera's list)
    #[arg(long, value_delimiter = ',', value_name = "WxH,...")]
    pub sizes: Vec<Size>,

    /// Preview view size
    #[arg(long, default_value = "1080x1920", value_name = "WxH")]
    pub view: Size,

    /// Display rotation in degrees
    #[arg(long, default_value = "0", value_parser = parse_rotation)]
    pub rotation: DisplayRotation,

    /// Lens direction ("front" or "back")
    #[arg(long, value_parser = parse_facing)]
    pub facing: Option<LensFacing>,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,
}

/// What the probe command prints.
#[derive(Debug, Serialize)]
pub struct ProbeReport {
    /// Device and resolution selection.
    #[serde(flatten)]
    pub outcome: ProbeOutcome,
    /// Aspect ratio the preview adopts for the view's orientation.
    pub preview_aspect: (u32, u32),
    /// Buffer-to-view transform for the requested rotation.
    pub transform: DisplayTransform,
    /// Orientation, in degrees, to tag still captures with.
    pub still_orientation: u32,
}

impl ProbeReport {
    /// Derives the preview settings for `view` at `rotation`.
    #[must_use]
    pub fn new(
        outcome: ProbeOutcome,
        view: Size,
        rotation: DisplayRotation,
        legacy_translate: Option<(f32, f32)>,
    ) -> Self {
        let orientation = if view.is_landscape() {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        };
        Self {
            preview_aspect: outcome.preview_aspect(orientation),
            transform: configure_transform(
                view,
                outcome.resolution.size,
                rotation,
                legacy_translate,
            ),
            still_orientation: rotation.sensor_orientation(),
            outcome,
        }
    }
}

/// Run the probe command.
pub fn run(args: &ProbeArgs, config: &AppConfig) -> Result<ExitCode> {
    let mut synthetic = SyntheticConfig::default();
    if !args.sizes.is_empty() {
        synthetic.sizes.clone_from(&args.sizes);
    }
    let camera = SyntheticCamera::new(RgbaImage::new(1, 1), synthetic);

    let prober = CapabilityProber::new(probe_config(args.facing, config));
    let outcome = prober.probe(&camera, args.view)?;
    info!(
        "Device {} at {} for view {}",
        outcome.device_id, outcome.resolution.size, args.view
    );

    let legacy = config.camera.legacy_translate.map(|[dx, dy]| (dx, dy));
    let report = ProbeReport::new(outcome, args.view, args.rotation, legacy);

    JsonOutput::stdout().write_value(&report, args.pretty)?;
    Ok(ExitCode::Success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyestate_core::domain::ChosenResolution;

    #[test]
    fn test_parse_rotation() {
        assert_eq!(parse_rotation("90"), Ok(DisplayRotation::Rotation90));
        assert!(parse_rotation("45").is_err());
        assert!(parse_rotation("x").is_err());
    }

    #[test]
    fn test_report_tags_still_orientation() {
        let outcome = ProbeOutcome {
            device_id: "1".to_string(),
            resolution: ChosenResolution::new(Size::new(1280, 720)),
            aspect_reference: Size::new(1920, 1080),
            requested: Size::new(1080, 1920),
        };

        let portrait = ProbeReport::new(
            outcome.clone(),
            Size::new(1080, 1920),
            DisplayRotation::Rotation0,
            None,
        );
        assert_eq!(portrait.still_orientation, 90);
        assert_eq!(portrait.preview_aspect, (720, 1280));

        let sideways =
            ProbeReport::new(outcome, Size::new(1920, 1080), DisplayRotation::Rotation270, None);
        assert_eq!(sideways.still_orientation, 180);
        assert_eq!(sideways.preview_aspect, (1280, 720));
    }

    #[test]
    fn test_probe_config_precedence() {
        let mut config = AppConfig::default();
        config.camera.facing = Some("back".to_string());
        config.camera.minimum_size = Some(640);

        assert_eq!(probe_config(None, &config).facing, LensFacing::Back);
        assert_eq!(
            probe_config(Some(LensFacing::Front), &config).facing,
            LensFacing::Front
        );
        assert_eq!(probe_config(None, &config).minimum_size, 640);
        assert_eq!(
            probe_config(None, &AppConfig::default()).facing,
            LensFacing::Front
        );
    }
}
