//! Mock implementations of core port traits.
//!
//! Camera mocks share one [`CallLog`] so tests can assert on the order in
//! which the session drives the platform.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use eyestate_core::camera::DisplayTransform;
use eyestate_core::domain::{
    CaptureDevice, EyeBundle, EyePair, Frame, ResultBatch, Size, StabilityState,
};
use eyestate_core::error::{CaptureError, InferenceError};
use eyestate_core::ports::{
    CameraProvider, CaptureRequest, DeviceHandle, DisplaySurface, EyeRegionExtractor,
    FrameReader, HostContext, Navigator, PreviewListener, ReaderConfig, SessionEvent,
    SessionEvents, StateSink, StreamingSession, SurfaceId,
};

/// Ordered record of platform calls made through the camera mocks.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    /// Appends an entry.
    pub fn push(&self, entry: impl Into<String>) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.into());
    }

    /// All entries so far.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Entries that start with `prefix`.
    #[must_use]
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e.starts_with(prefix))
            .collect()
    }
}

/// Failure switches for the camera mocks.
#[derive(Debug, Default)]
pub struct MockBehavior {
    /// `devices()` reports the capture API as unavailable.
    pub unavailable: AtomicBool,
    /// `open_device()` fails immediately.
    pub fail_open: AtomicBool,
    /// `create_reader()` fails.
    pub fail_reader: AtomicBool,
    /// `create_session()` fails before posting any callback.
    pub fail_session: AtomicBool,
    /// Session configuration reports `ConfigureFailed`.
    pub fail_configure: AtomicBool,
    /// `set_repeating_request()` fails.
    pub fail_request: AtomicBool,
    /// Every `close()` fails.
    pub fail_close: AtomicBool,
    /// Callbacks are not posted; the test delivers them itself.
    pub manual: AtomicBool,
}

impl MockBehavior {
    fn is(flag: &AtomicBool) -> bool {
        flag.load(Ordering::SeqCst)
    }
}

/// Mock camera framework.
///
/// By default opening a device immediately posts `Opened`, and creating a
/// session immediately posts `Configured`.
pub struct MockCameraProvider {
    devices: Vec<CaptureDevice>,
    behavior: Arc<MockBehavior>,
    log: CallLog,
    next_surface: AtomicU64,
    frames: Mutex<Option<Sender<Frame>>>,
    events: Mutex<Option<SessionEvents>>,
}

impl MockCameraProvider {
    /// Creates a provider listing `devices`.
    #[must_use]
    pub fn new(devices: Vec<CaptureDevice>) -> Self {
        Self {
            devices,
            behavior: Arc::new(MockBehavior::default()),
            log: CallLog::default(),
            next_surface: AtomicU64::new(100),
            frames: Mutex::new(None),
            events: Mutex::new(None),
        }
    }

    /// Failure switches.
    #[must_use]
    pub fn behavior(&self) -> &MockBehavior {
        &self.behavior
    }

    /// Shared call log.
    #[must_use]
    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    /// Delivers a frame to the most recently created reader.
    ///
    /// Returns `false` if no reader exists or its channel is closed.
    #[must_use]
    pub fn deliver(&self, frame: Frame) -> bool {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|tx| tx.send_timeout(frame, Duration::from_secs(5)).is_ok())
    }

    /// Posts an event on the channel of the most recent open.
    #[must_use]
    pub fn post(&self, event: SessionEvent) -> bool {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|tx| tx.send(event).is_ok())
    }

    /// A device handle sharing this provider's log and behavior.
    #[must_use]
    pub fn device(&self, id: &str) -> MockDevice {
        MockDevice {
            id: id.to_string(),
            behavior: Arc::clone(&self.behavior),
            log: self.log.clone(),
        }
    }

    /// A streaming session sharing this provider's log and behavior.
    #[must_use]
    pub fn streaming_session(&self) -> MockStreamingSession {
        MockStreamingSession {
            behavior: Arc::clone(&self.behavior),
            log: self.log.clone(),
        }
    }
}

impl CameraProvider for MockCameraProvider {
    fn devices(&self) -> Result<Vec<CaptureDevice>, CaptureError> {
        if MockBehavior::is(&self.behavior.unavailable) {
            return Err(CaptureError::UnsupportedDevice("camera API unavailable".into()));
        }
        Ok(self.devices.clone())
    }

    fn open_device(&self, device_id: &str, events: SessionEvents) -> Result<(), CaptureError> {
        self.log.push(format!("open {device_id}"));
        if MockBehavior::is(&self.behavior.fail_open) {
            return Err(CaptureError::Platform(anyhow::anyhow!("open refused")));
        }
        *self.events.lock().unwrap_or_else(PoisonError::into_inner) = Some(events.clone());
        if !MockBehavior::is(&self.behavior.manual) {
            let _ = events.send(SessionEvent::Opened(Box::new(self.device(device_id))));
        }
        Ok(())
    }

    fn create_reader(
        &self,
        config: ReaderConfig,
        frames: Sender<Frame>,
    ) -> Result<Box<dyn FrameReader>, CaptureError> {
        self.log.push(format!(
            "reader {} {:?} x{}",
            config.size, config.format, config.max_images
        ));
        if MockBehavior::is(&self.behavior.fail_reader) {
            return Err(CaptureError::Platform(anyhow::anyhow!("reader refused")));
        }
        *self.frames.lock().unwrap_or_else(PoisonError::into_inner) = Some(frames);
        Ok(Box::new(MockFrameReader {
            surface: SurfaceId(self.next_surface.fetch_add(1, Ordering::SeqCst)),
            behavior: Arc::clone(&self.behavior),
            log: self.log.clone(),
        }))
    }
}

/// Mock open device.
pub struct MockDevice {
    id: String,
    behavior: Arc<MockBehavior>,
    log: CallLog,
}

impl DeviceHandle for MockDevice {
    fn id(&self) -> &str {
        &self.id
    }

    fn create_session(
        &mut self,
        outputs: &[SurfaceId],
        events: SessionEvents,
    ) -> Result<(), CaptureError> {
        self.log
            .push(format!("device.create_session {}", outputs.len()));
        if MockBehavior::is(&self.behavior.fail_session) {
            return Err(CaptureError::SessionConfiguration("session refused".into()));
        }
        if MockBehavior::is(&self.behavior.manual) {
            return Ok(());
        }
        let event = if MockBehavior::is(&self.behavior.fail_configure) {
            SessionEvent::ConfigureFailed
        } else {
            SessionEvent::Configured(Box::new(MockStreamingSession {
                behavior: Arc::clone(&self.behavior),
                log: self.log.clone(),
            }))
        };
        let _ = events.send(event);
        Ok(())
    }

    fn close(&mut self) -> Result<(), CaptureError> {
        self.log.push("device.close");
        close_result(&self.behavior)
    }
}

/// Mock streaming session.
pub struct MockStreamingSession {
    behavior: Arc<MockBehavior>,
    log: CallLog,
}

impl StreamingSession for MockStreamingSession {
    fn set_repeating_request(&mut self, request: &CaptureRequest) -> Result<(), CaptureError> {
        self.log
            .push(format!("session.request {}", request.targets.len()));
        if MockBehavior::is(&self.behavior.fail_request) {
            return Err(CaptureError::Platform(anyhow::anyhow!("request rejected")));
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), CaptureError> {
        self.log.push("session.close");
        close_result(&self.behavior)
    }
}

/// Mock frame reader.
pub struct MockFrameReader {
    surface: SurfaceId,
    behavior: Arc<MockBehavior>,
    log: CallLog,
}

impl FrameReader for MockFrameReader {
    fn surface(&self) -> SurfaceId {
        self.surface
    }

    fn close(&mut self) -> Result<(), CaptureError> {
        self.log.push("reader.close");
        close_result(&self.behavior)
    }
}

fn close_result(behavior: &MockBehavior) -> Result<(), CaptureError> {
    if MockBehavior::is(&behavior.fail_close) {
        Err(CaptureError::Platform(anyhow::anyhow!("close failed")))
    } else {
        Ok(())
    }
}

/// Mock preview surface recording what the session applied.
#[derive(Default)]
pub struct MockDisplay {
    buffer_size: Mutex<Option<Size>>,
    aspect: Mutex<Option<(u32, u32)>>,
    transform: Mutex<Option<DisplayTransform>>,
}

impl MockDisplay {
    /// Creates a display with nothing applied.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last default buffer size.
    #[must_use]
    pub fn buffer_size(&self) -> Option<Size> {
        *self.buffer_size.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Last aspect ratio.
    #[must_use]
    pub fn aspect(&self) -> Option<(u32, u32)> {
        *self.aspect.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Last transform.
    #[must_use]
    pub fn transform(&self) -> Option<DisplayTransform> {
        *self.transform.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DisplaySurface for MockDisplay {
    fn surface(&self) -> SurfaceId {
        SurfaceId(1)
    }

    fn set_default_buffer_size(&self, size: Size) {
        *self.buffer_size.lock().unwrap_or_else(PoisonError::into_inner) = Some(size);
    }

    fn set_aspect_ratio(&self, width: u32, height: u32) {
        *self.aspect.lock().unwrap_or_else(PoisonError::into_inner) = Some((width, height));
    }

    fn set_transform(&self, transform: &DisplayTransform) {
        *self.transform.lock().unwrap_or_else(PoisonError::into_inner) = Some(*transform);
    }
}

/// Mock host counting finish requests.
#[derive(Default)]
pub struct MockHost {
    finished: AtomicUsize,
}

impl MockHost {
    /// Times `finish` was called.
    #[must_use]
    pub fn finish_count(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

impl HostContext for MockHost {
    fn finish(&self) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

/// Mock preview listener counting teardowns.
#[derive(Default)]
pub struct MockListener {
    deinitialized: AtomicUsize,
}

impl MockListener {
    /// Times `deinitialize` was called.
    #[must_use]
    pub fn deinit_count(&self) -> usize {
        self.deinitialized.load(Ordering::SeqCst)
    }
}

impl PreviewListener for MockListener {
    fn deinitialize(&self) {
        self.deinitialized.fetch_add(1, Ordering::SeqCst);
    }
}

/// What [`MockExtractor`] returns for each frame.
#[derive(Debug, Clone)]
pub enum ExtractorMode {
    /// Always the given pair.
    Found(EyePair),
    /// Never finds eyes.
    NoEyes,
    /// Always fails.
    Fails,
}

/// Mock eye region extractor.
pub struct MockExtractor {
    mode: ExtractorMode,
    calls: AtomicUsize,
}

impl MockExtractor {
    /// Creates an extractor with the given behaviour.
    #[must_use]
    pub const fn new(mode: ExtractorMode) -> Self {
        Self {
            mode,
            calls: AtomicUsize::new(0),
        }
    }

    /// Frames seen.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EyeRegionExtractor for MockExtractor {
    fn extract(&self, _frame: &Frame) -> anyhow::Result<Option<EyePair>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.mode {
            ExtractorMode::Found(pair) => Ok(Some(pair.clone())),
            ExtractorMode::NoEyes => Ok(None),
            ExtractorMode::Fails => anyhow::bail!("extractor failure"),
        }
    }
}

/// Mock navigator that forwards everything onto channels.
pub struct MockNavigator {
    captured_tx: Sender<EyeBundle>,
    captured_rx: Receiver<EyeBundle>,
    verified_tx: Sender<ResultBatch>,
    verified_rx: Receiver<ResultBatch>,
    failures: Mutex<Vec<String>>,
}

impl Default for MockNavigator {
    fn default() -> Self {
        let (captured_tx, captured_rx) = unbounded();
        let (verified_tx, verified_rx) = unbounded();
        Self {
            captured_tx,
            captured_rx,
            verified_tx,
            verified_rx,
            failures: Mutex::new(Vec::new()),
        }
    }
}

impl MockNavigator {
    /// Waits for the next captured bundle.
    #[must_use]
    pub fn wait_captured(&self, timeout: Duration) -> Option<EyeBundle> {
        self.captured_rx.recv_timeout(timeout).ok()
    }

    /// Waits for the next verified batch.
    #[must_use]
    pub fn wait_verified(&self, timeout: Duration) -> Option<ResultBatch> {
        self.verified_rx.recv_timeout(timeout).ok()
    }

    /// Messages of every reported failure.
    #[must_use]
    pub fn failures(&self) -> Vec<String> {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Navigator for MockNavigator {
    fn on_eyes_captured(&self, bundle: &EyeBundle) {
        let _ = self.captured_tx.send(bundle.clone());
    }

    fn on_verified(&self, batch: ResultBatch) {
        let _ = self.verified_tx.send(batch);
    }

    fn on_failed(&self, error: &InferenceError) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(error.to_string());
    }
}

/// Mock state sink recording posted states.
#[derive(Default)]
pub struct MockStateSink {
    states: Mutex<Vec<StabilityState>>,
}

impl MockStateSink {
    /// Posted states in order.
    #[must_use]
    pub fn states(&self) -> Vec<StabilityState> {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl StateSink for MockStateSink {
    fn post(&self, state: StabilityState) {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(state);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use eyestate_core::domain::LensFacing;

    #[test]
    fn test_provider_posts_opened_by_default() {
        let provider = MockCameraProvider::new(vec![CaptureDevice::new("1", LensFacing::Front)]);
        let (tx, rx) = unbounded();
        provider.open_device("1", tx).unwrap();

        assert!(matches!(rx.try_recv(), Ok(SessionEvent::Opened(_))));
        assert_eq!(provider.log().entries(), vec!["open 1"]);
    }

    #[test]
    fn test_manual_mode_posts_nothing() {
        let provider = MockCameraProvider::new(vec![]);
        provider.behavior().manual.store(true, Ordering::SeqCst);
        let (tx, rx) = unbounded();
        provider.open_device("1", tx).unwrap();
        assert!(rx.try_recv().is_err());
        assert!(provider.post(SessionEvent::Disconnected));
        assert!(matches!(rx.try_recv(), Ok(SessionEvent::Disconnected)));
    }
}
