//! The running capture pipeline.
//!
//! Four named workers connected by channels:
//!
//! - `session` applies platform callbacks to the [`CaptureSession`]
//! - `frames` crops each delivered frame (at most two in flight)
//! - `inference` verifies complete eye bundles, one at a time
//! - `sensor` turns readings into posted stability states

mod collector;
mod frames;
mod sensor;
mod worker;

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use crossbeam_channel::{bounded, unbounded, Sender};
use tracing::{info, warn};

pub use collector::CropCollector;
pub use frames::FrameProcessor;
pub use sensor::{StabilityConfig, StabilityMonitor, ThresholdClassifier};
pub use worker::Worker;

use crate::camera::{
    CapabilityProber, CaptureSession, DisplayTransform, ProbeConfig, ProbeOutcome, SessionConfig,
    SessionPorts, SessionState,
};
use crate::domain::{DisplayRotation, Orientation, SensorReading, Size};
use crate::error::CaptureError;
use crate::inference::{verify, InferenceEngine};
use crate::ports::{
    CameraProvider, DisplaySurface, EyeRegionExtractor, HostContext, Navigator,
    StabilityClassifier, StateSink,
};

/// Frames the frame channel holds before producers block.
const FRAME_QUEUE_DEPTH: usize = 2;

/// Pipeline tunables.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Device and resolution selection.
    pub probe: ProbeConfig,
    /// Session lifecycle.
    pub session: SessionConfig,
}

/// Platform collaborators the pipeline is wired to.
pub struct PipelineParts {
    /// Camera framework.
    pub provider: Arc<dyn CameraProvider>,
    /// Preview surface.
    pub display: Arc<dyn DisplaySurface>,
    /// Hosting screen.
    pub host: Arc<dyn HostContext>,
    /// Crops eyes out of frames.
    pub extractor: Arc<dyn EyeRegionExtractor>,
    /// Receives captured and verified batches.
    pub navigator: Arc<dyn Navigator>,
    /// Turns sensor readings into stability states.
    pub classifier: Box<dyn StabilityClassifier>,
    /// Receives stability changes.
    pub state_sink: Arc<dyn StateSink>,
}

/// Owns the capture session and its workers.
pub struct CameraPipeline {
    prober: CapabilityProber,
    provider: Arc<dyn CameraProvider>,
    display: Arc<dyn DisplaySurface>,
    session: Arc<CaptureSession>,
    collector: Arc<CropCollector>,
    sensor_tx: Sender<SensorReading>,
    outcome: Mutex<Option<ProbeOutcome>>,
    workers: Vec<Worker>,
}

impl CameraPipeline {
    /// Wires the session to `parts` and starts the workers. `engine` moves
    /// onto the inference worker and must already be initialized.
    ///
    /// # Errors
    ///
    /// Returns an error if a worker thread cannot be spawned.
    pub fn start(
        config: PipelineConfig,
        parts: PipelineParts,
        engine: InferenceEngine,
    ) -> Result<Self> {
        let (event_tx, event_rx) = unbounded();
        let (frame_tx, frame_rx) = bounded(FRAME_QUEUE_DEPTH);
        let (bundle_tx, bundle_rx) = bounded(1);
        let (sensor_tx, sensor_rx) = unbounded();

        let collector = Arc::new(CropCollector::new());
        let session = Arc::new(CaptureSession::new(
            config.session,
            SessionPorts {
                provider: Arc::clone(&parts.provider),
                display: Arc::clone(&parts.display),
                host: parts.host,
                listener: collector.clone(),
            },
            event_tx,
            frame_tx,
        ));

        let mut workers = Vec::with_capacity(4);

        let events_session = Arc::clone(&session);
        workers.push(Worker::spawn("session", event_rx, move |event| {
            if let Err(e) = events_session.handle_event(event) {
                warn!("Session event failed: {e}");
            }
        })?);

        let processor = FrameProcessor::new(
            parts.extractor,
            Arc::clone(&collector),
            Arc::clone(&parts.navigator),
            bundle_tx,
        );
        workers.push(Worker::spawn("frames", frame_rx, move |frame| {
            processor.process(frame);
        })?);

        let navigator = parts.navigator;
        workers.push(Worker::spawn("inference", bundle_rx, move |bundle| {
            match verify(&engine, &bundle) {
                Ok(batch) => navigator.on_verified(batch),
                Err(e) => {
                    warn!("Verification failed: {e}");
                    navigator.on_failed(&e);
                }
            }
        })?);

        let mut monitor = StabilityMonitor::new(parts.classifier, parts.state_sink);
        workers.push(Worker::spawn("sensor", sensor_rx, move |reading| {
            monitor.on_reading(&reading);
        })?);

        info!("Camera pipeline started");
        Ok(Self {
            prober: CapabilityProber::new(config.probe),
            provider: parts.provider,
            display: parts.display,
            session,
            collector,
            sensor_tx,
            outcome: Mutex::new(None),
            workers,
        })
    }

    /// Probes the camera for a `view` sized preview and starts opening it.
    ///
    /// # Errors
    ///
    /// Returns probing errors and [`CaptureSession::open`] errors.
    pub fn open_camera(
        &self,
        view: Size,
        rotation: DisplayRotation,
    ) -> Result<ProbeOutcome, CaptureError> {
        let outcome = self.apply_probe(view, rotation)?;
        self.session.open(&outcome.device_id, outcome.resolution)?;
        Ok(outcome)
    }

    /// Re-selects the resolution after the preview surface changed size.
    ///
    /// # Errors
    ///
    /// Returns probing errors.
    pub fn on_surface_size_changed(
        &self,
        view: Size,
        rotation: DisplayRotation,
    ) -> Result<ProbeOutcome, CaptureError> {
        self.apply_probe(view, rotation)
    }

    fn apply_probe(
        &self,
        view: Size,
        rotation: DisplayRotation,
    ) -> Result<ProbeOutcome, CaptureError> {
        let outcome = self.prober.probe(self.provider.as_ref(), view)?;
        let orientation = if view.is_landscape() {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        };
        let (w, h) = outcome.preview_aspect(orientation);
        self.display.set_aspect_ratio(w, h);

        self.session.set_resolution(outcome.resolution);
        self.session.configure_transform(view, rotation);

        *self
            .outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(outcome.clone());
        Ok(outcome)
    }

    /// Recomputes the preview transform, for example after a rotation.
    pub fn configure_transform(
        &self,
        view: Size,
        rotation: DisplayRotation,
    ) -> Option<DisplayTransform> {
        self.session.configure_transform(view, rotation)
    }

    /// Closes the camera. Workers keep running.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::LockTimeout`] if an open is still pending.
    pub fn close_camera(&self) -> Result<(), CaptureError> {
        self.session.close()
    }

    /// Channel for platform sensor readings.
    #[must_use]
    pub fn sensor_input(&self) -> Sender<SensorReading> {
        self.sensor_tx.clone()
    }

    /// Current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// The capture session.
    #[must_use]
    pub const fn session(&self) -> &Arc<CaptureSession> {
        &self.session
    }

    /// The crop collector.
    #[must_use]
    pub const fn collector(&self) -> &Arc<CropCollector> {
        &self.collector
    }

    /// Result of the most recent probe.
    #[must_use]
    pub fn last_probe(&self) -> Option<ProbeOutcome> {
        self.outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Closes the camera and joins every worker.
    pub fn stop(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        if let Err(e) = self.session.close() {
            warn!("Failed to close camera during shutdown: {e}");
        }
        for worker in &mut self.workers {
            worker.stop();
        }
        self.workers.clear();
        info!("Camera pipeline stopped");
    }
}

impl Drop for CameraPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}
