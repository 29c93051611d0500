//! End-to-end pipeline: mock camera frames through to verified batches.

#![allow(clippy::unwrap_used)]

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use eyestate_core::camera::SessionState;
use eyestate_core::domain::{DisplayRotation, SensorReading, Size, StabilityState};
use eyestate_core::error::CaptureError;
use eyestate_core::inference::{EngineConfig, InferenceEngine};
use eyestate_core::pipeline::{CameraPipeline, PipelineConfig, PipelineParts, ThresholdClassifier};
use eyestate_test_support::{
    DeviceBuilder, ExtractorMode, MockCameraProvider, MockDisplay, MockExtractor, MockHost,
    MockNavigator, MockStateSink, SyntheticEyes, ZeroModel,
};
use tempfile::TempDir;

const WAIT: Duration = Duration::from_secs(10);

struct Rig {
    pipeline: CameraPipeline,
    provider: Arc<MockCameraProvider>,
    display: Arc<MockDisplay>,
    extractor: Arc<MockExtractor>,
    navigator: Arc<MockNavigator>,
    sink: Arc<MockStateSink>,
    _models: TempDir,
}

fn rig(mode: ExtractorMode) -> Rig {
    let models = tempfile::tempdir().unwrap();
    let zero = ZeroModel::write(models.path()).unwrap();
    let engine = InferenceEngine::new(EngineConfig::default());
    engine.initialize(&zero.model, &zero.labels).unwrap();

    let provider = Arc::new(MockCameraProvider::new(DeviceBuilder::phone()));
    let display = Arc::new(MockDisplay::new());
    let extractor = Arc::new(MockExtractor::new(mode));
    let navigator = Arc::new(MockNavigator::default());
    let sink = Arc::new(MockStateSink::default());

    let pipeline = CameraPipeline::start(
        PipelineConfig::default(),
        PipelineParts {
            provider: provider.clone(),
            display: display.clone(),
            host: Arc::new(MockHost::default()),
            extractor: extractor.clone(),
            navigator: navigator.clone(),
            classifier: Box::new(ThresholdClassifier::default()),
            state_sink: sink.clone(),
        },
        engine,
    )
    .unwrap();

    Rig {
        pipeline,
        provider,
        display,
        extractor,
        navigator,
        sink,
        _models: models,
    }
}

fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < WAIT {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

fn open(rig: &Rig) {
    let outcome = rig
        .pipeline
        .open_camera(Size::new(1080, 1920), DisplayRotation::Rotation0)
        .unwrap();
    assert_eq!(outcome.device_id, "1");
    assert_eq!(outcome.resolution.size, Size::new(720, 720));
    assert!(wait_for(|| rig.pipeline.state() == SessionState::Active));
}

#[test]
fn test_five_frames_produce_verified_batch() {
    let rig = rig(ExtractorMode::Found(SyntheticEyes::pair(128)));
    open(&rig);

    for _ in 0..5 {
        assert!(rig.provider.deliver(SyntheticEyes::frame(Size::new(64, 48), [90, 90, 90])));
    }

    let captured = rig.navigator.wait_captured(WAIT).unwrap();
    assert_eq!(captured.len(), 5);

    let batch = rig.navigator.wait_verified(WAIT).unwrap();
    assert_eq!(batch.len(), 5);
    for entry in batch.entries() {
        assert_eq!(entry.scores.len(), 7);
        for s in entry.scores.as_slice() {
            assert!((s - 2.0 / 7.0).abs() < 1e-5);
        }
    }
    assert!(rig.navigator.failures().is_empty());
}

#[test]
fn test_frames_after_full_batch_are_ignored_until_close() {
    let mut rig = rig(ExtractorMode::Found(SyntheticEyes::pair(10)));
    open(&rig);

    for _ in 0..7 {
        assert!(rig.provider.deliver(SyntheticEyes::frame(Size::new(32, 32), [0, 0, 0])));
    }
    assert!(rig.navigator.wait_verified(WAIT).is_some());
    assert!(wait_for(|| rig.pipeline.collector().is_sealed()));
    assert_eq!(rig.extractor.calls(), 5);
    assert!(rig.navigator.wait_captured(Duration::from_millis(50)).is_some());
    assert!(rig.navigator.wait_captured(Duration::from_millis(50)).is_none());

    rig.pipeline.close_camera().unwrap();
    assert!(!rig.pipeline.collector().is_sealed());
    rig.pipeline.stop();
}

#[test]
fn test_frames_without_eyes_never_batch() {
    let rig = rig(ExtractorMode::NoEyes);
    open(&rig);

    for _ in 0..6 {
        assert!(rig.provider.deliver(SyntheticEyes::frame(Size::new(16, 16), [200, 0, 0])));
    }
    assert!(wait_for(|| rig.extractor.calls() == 6));
    assert!(rig.navigator.wait_captured(Duration::from_millis(50)).is_none());
    assert!(rig.pipeline.collector().is_empty());
}

#[test]
fn test_open_sets_preview_aspect_for_portrait() {
    let rig = rig(ExtractorMode::NoEyes);
    open(&rig);
    assert_eq!(rig.display.aspect(), Some((720, 720)));
    assert!(rig.display.transform().is_some());
    assert!(rig.pipeline.last_probe().is_some());
}

#[test]
fn test_unavailable_camera_is_unsupported() {
    let rig = rig(ExtractorMode::NoEyes);
    rig.provider
        .behavior()
        .unavailable
        .store(true, Ordering::SeqCst);

    let err = rig
        .pipeline
        .open_camera(Size::new(1080, 1920), DisplayRotation::Rotation0)
        .unwrap_err();
    assert!(matches!(err, CaptureError::UnsupportedDevice(_)));
    assert_eq!(rig.pipeline.state(), SessionState::Closed);
}

#[test]
fn test_sensor_states_posted_on_change() {
    let mut rig = rig(ExtractorMode::NoEyes);
    let input = rig.pipeline.sensor_input();
    for rate in [0.0, 0.05, 1.5, 2.0, 0.0] {
        input
            .send(SensorReading::Gyroscope {
                x: rate,
                y: 0.0,
                z: 0.0,
            })
            .unwrap();
    }
    input.send(SensorReading::Light { lux: 1.0 }).unwrap();

    rig.pipeline.stop();
    assert_eq!(
        rig.sink.states(),
        vec![
            StabilityState::Steady,
            StabilityState::Unstable,
            StabilityState::Steady,
            StabilityState::Unstable
        ]
    );
}

#[test]
fn test_stop_closes_camera() {
    let mut rig = rig(ExtractorMode::NoEyes);
    open(&rig);
    rig.pipeline.stop();
    assert_eq!(rig.pipeline.state(), SessionState::Closed);
    assert!(rig
        .provider
        .log()
        .entries()
        .iter()
        .any(|e| e == "device.close"));
}
