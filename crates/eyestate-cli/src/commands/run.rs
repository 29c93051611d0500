//! Run command - stream a still image through the capture pipeline.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Args;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use eyestate_adapters::{
    ChannelNavigator, ExtractorConfig, FixedRegionExtractor, HeadlessDisplay, HeadlessHost,
    LoggingStateSink, Navigation, Region, SyntheticCamera, SyntheticConfig,
};
use eyestate_core::camera::SessionConfig;
use eyestate_core::domain::{DisplayRotation, LensFacing, ResultBatch, Size};
use eyestate_core::pipeline::{
    CameraPipeline, PipelineConfig, PipelineParts, StabilityConfig, ThresholdClassifier,
};
use tracing::{info, warn};

use super::probe::{parse_facing, parse_rotation, probe_config};
use super::{ExitCode, ScoringArgs};
use crate::config::AppConfig;
use crate::output::BatchReport;

/// Arguments for the run command
#[derive(Args, Clone)]
pub struct RunArgs {
    /// Image the synthetic camera streams
    #[arg(long, value_name = "IMG")]
    pub source: PathBuf,

    /// Preview view size
    #[arg(long, default_value = "1080x1920", value_name = "WxH")]
    pub view: Size,

    /// Display rotation in degrees
    #[arg(long, default_value = "0", value_parser = parse_rotation)]
    pub rotation: DisplayRotation,

    /// Lens direction ("front" or "back")
    #[arg(long, value_parser = parse_facing)]
    pub facing: Option<LensFacing>,

    /// Milliseconds between synthetic frames
    #[arg(long, default_value_t = 33, value_name = "MS")]
    pub interval_ms: u64,

    /// Seconds to wait for a verified batch
    #[arg(long, default_value_t = 30, value_name = "SECS")]
    pub timeout: u64,

    #[command(flatten)]
    pub scoring: ScoringArgs,
}

fn region(r: Option<[f32; 4]>, fallback: Region) -> Region {
    r.map_or(fallback, |[x, y, w, h]| Region { x, y, w, h })
}

/// Builds the pipeline configuration: CLI > config > defaults.
fn pipeline_config(args: &RunArgs, config: &AppConfig) -> PipelineConfig {
    let defaults = SessionConfig::default();
    PipelineConfig {
        probe: probe_config(args.facing, config),
        session: SessionConfig {
            lock_timeout: config
                .camera
                .lock_timeout_ms
                .map_or(defaults.lock_timeout, Duration::from_millis),
            max_images: config.camera.max_images.unwrap_or(defaults.max_images),
            legacy_translate: config.camera.legacy_translate.map(|[dx, dy]| (dx, dy)),
            ..defaults
        },
        ..PipelineConfig::default()
    }
}

fn extractor_config(config: &AppConfig) -> ExtractorConfig {
    let defaults = ExtractorConfig::default();
    ExtractorConfig {
        left: region(config.extractor.left, defaults.left),
        right: region(config.extractor.right, defaults.right),
        min_contrast: config.extractor.min_contrast.unwrap_or(defaults.min_contrast),
    }
}

fn stability_config(config: &AppConfig) -> StabilityConfig {
    let defaults = StabilityConfig::default();
    StabilityConfig {
        max_rotation_rate: config
            .sensor
            .max_rotation_rate
            .unwrap_or(defaults.max_rotation_rate),
        min_lux: config.sensor.min_lux.unwrap_or(defaults.min_lux),
    }
}

/// Longest single wait between host-finish checks.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Waits for a verified batch. `Ok(None)` means the timeout elapsed.
fn wait_for_batch(
    events: &Receiver<Navigation>,
    host: &HeadlessHost,
    timeout: Duration,
) -> Result<Option<ResultBatch>> {
    let deadline = Instant::now() + timeout;
    loop {
        if host.is_finished() {
            anyhow::bail!("Camera reported an unrecoverable error");
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(None);
        }
        match events.recv_timeout(remaining.min(POLL_INTERVAL)) {
            Ok(Navigation::Captured(n)) => info!("Captured {n} eye pairs, verifying"),
            Ok(Navigation::Verified(batch)) => return Ok(Some(batch)),
            Ok(Navigation::Failed(e)) => anyhow::bail!("Verification failed: {e}"),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                anyhow::bail!("Pipeline stopped unexpectedly")
            }
        }
    }
}

/// Run the run command.
pub fn run(args: &RunArgs, config: &AppConfig) -> Result<ExitCode> {
    let scoring = args.scoring.clone().with_config(config);
    let engine = scoring.load_engine(config)?;
    let labels = engine.labels().to_vec();

    let camera = SyntheticCamera::from_path(
        &args.source,
        SyntheticConfig {
            frame_interval: Duration::from_millis(args.interval_ms.max(1)),
            ..SyntheticConfig::default()
        },
    )?;
    let (navigator, events) = ChannelNavigator::new();
    let host = Arc::new(HeadlessHost::default());

    let mut pipeline = CameraPipeline::start(
        pipeline_config(args, config),
        PipelineParts {
            provider: Arc::new(camera),
            display: Arc::new(HeadlessDisplay::new()),
            host: host.clone(),
            extractor: Arc::new(FixedRegionExtractor::new(extractor_config(config))),
            navigator: Arc::new(navigator),
            classifier: Box::new(ThresholdClassifier::new(stability_config(config))),
            state_sink: Arc::new(LoggingStateSink),
        },
        engine,
    )?;

    let outcome = pipeline.open_camera(args.view, args.rotation)?;
    info!(
        "Streaming {} from device {} at {}",
        args.source.display(),
        outcome.device_id,
        outcome.resolution.size
    );

    let result = wait_for_batch(&events, &host, Duration::from_secs(args.timeout));
    pipeline.stop();

    match result? {
        Some(batch) => {
            let report = BatchReport::new(args.source.display().to_string(), &batch, &labels);
            scoring.print(&report)?;
            Ok(ExitCode::Success)
        }
        None => {
            warn!(
                "No verified batch within {}s; are the eye regions on the subject?",
                args.timeout
            );
            Ok(ExitCode::NotVerified)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_from_config() {
        let fallback = ExtractorConfig::default().left;
        assert_eq!(region(None, fallback), fallback);
        assert_eq!(
            region(Some([0.1, 0.2, 0.3, 0.4]), fallback),
            Region {
                x: 0.1,
                y: 0.2,
                w: 0.3,
                h: 0.4
            }
        );
    }

    #[test]
    fn test_session_config_from_file() {
        let mut config = AppConfig::default();
        config.camera.lock_timeout_ms = Some(100);
        config.camera.legacy_translate = Some([0.0, -600.0]);
        let args = RunArgs {
            source: PathBuf::from("x.png"),
            view: Size::new(1080, 1920),
            rotation: DisplayRotation::Rotation0,
            facing: None,
            interval_ms: 33,
            timeout: 1,
            scoring: ScoringArgs::default(),
        };

        let pipeline = pipeline_config(&args, &config);
        assert_eq!(pipeline.session.lock_timeout, Duration::from_millis(100));
        assert_eq!(pipeline.session.legacy_translate, Some((0.0, -600.0)));
        assert_eq!(pipeline.session.max_images, 2);
    }

    #[test]
    fn test_wait_stops_when_host_finishes() {
        use eyestate_core::ports::HostContext;

        let (_navigator, events) = ChannelNavigator::new();
        let host = HeadlessHost::default();
        host.finish();

        let started = Instant::now();
        let result = wait_for_batch(&events, &host, Duration::from_secs(30));
        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_wait_times_out_without_batch() {
        let (_navigator, events) = ChannelNavigator::new();
        let host = HeadlessHost::default();
        let result = wait_for_batch(&events, &host, Duration::from_millis(150));
        assert!(matches!(result, Ok(None)));
    }

    #[test]
    fn test_wait_returns_verified_batch() {
        use eyestate_core::ports::Navigator;

        let (navigator, events) = ChannelNavigator::new();
        navigator.on_verified(ResultBatch::new(Vec::new(), Duration::from_millis(40)));
        let host = HeadlessHost::default();
        let batch = wait_for_batch(&events, &host, Duration::from_secs(5));
        assert!(matches!(batch, Ok(Some(b)) if b.verification_time() == 4));
    }

    #[test]
    fn test_stability_defaults() {
        let mut config = AppConfig::default();
        config.sensor.min_lux = Some(3.0);
        let s = stability_config(&config);
        assert!((s.min_lux - 3.0).abs() < f32::EPSILON);
        assert!((s.max_rotation_rate - 0.3).abs() < f32::EPSILON);
    }
}
