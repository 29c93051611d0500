//! Headless UI-side adapters.
//!
//! Stand-ins for the preview view, hosting screen, navigation and status
//! indicator when the pipeline runs without a display.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use crossbeam_channel::{unbounded, Receiver, Sender};
use eyestate_core::camera::DisplayTransform;
use eyestate_core::domain::{EyeBundle, ResultBatch, Size, StabilityState};
use eyestate_core::error::InferenceError;
use eyestate_core::ports::{DisplaySurface, HostContext, Navigator, StateSink, SurfaceId};
use tracing::{debug, info, warn};

/// Display surface that only records what was applied to it.
#[derive(Default)]
pub struct HeadlessDisplay {
    applied: Mutex<DisplayState>,
}

/// Settings applied to a [`HeadlessDisplay`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DisplayState {
    /// Default buffer size.
    pub buffer_size: Option<Size>,
    /// Aspect ratio as `(width, height)`.
    pub aspect: Option<(u32, u32)>,
    /// Buffer-to-view transform.
    pub transform: Option<DisplayTransform>,
}

impl HeadlessDisplay {
    /// Surface ID the headless preview uses in capture requests.
    pub const SURFACE: SurfaceId = SurfaceId(1);

    /// Creates a display with nothing applied.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the applied settings.
    #[must_use]
    pub fn state(&self) -> DisplayState {
        *self.applied.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, f: impl FnOnce(&mut DisplayState)) {
        f(&mut self.applied.lock().unwrap_or_else(PoisonError::into_inner));
    }
}

impl DisplaySurface for HeadlessDisplay {
    fn surface(&self) -> SurfaceId {
        Self::SURFACE
    }

    fn set_default_buffer_size(&self, size: Size) {
        debug!("Preview buffer size {size}");
        self.update(|s| s.buffer_size = Some(size));
    }

    fn set_aspect_ratio(&self, width: u32, height: u32) {
        debug!("Preview aspect {width}:{height}");
        self.update(|s| s.aspect = Some((width, height)));
    }

    fn set_transform(&self, transform: &DisplayTransform) {
        debug!(
            "Preview transform rotation={:.1} scale={:.3}",
            transform.rotation_degrees, transform.fill_scale
        );
        self.update(|s| s.transform = Some(*transform));
    }
}

/// Host that records a finish request.
#[derive(Default)]
pub struct HeadlessHost {
    finished: AtomicBool,
}

impl HeadlessHost {
    /// Whether the session asked the host to finish.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

impl HostContext for HeadlessHost {
    fn finish(&self) {
        warn!("Camera failed, host finishing");
        self.finished.store(true, Ordering::SeqCst);
    }
}

/// Events emitted by [`ChannelNavigator`].
#[derive(Debug)]
pub enum Navigation {
    /// A batch of eye pairs was captured.
    Captured(usize),
    /// The batch was scored.
    Verified(ResultBatch),
    /// Scoring failed.
    Failed(String),
}

/// Navigator forwarding every transition onto a channel.
pub struct ChannelNavigator {
    tx: Sender<Navigation>,
}

impl ChannelNavigator {
    /// Creates a navigator and the receiver for its events.
    #[must_use]
    pub fn new() -> (Self, Receiver<Navigation>) {
        let (tx, rx) = unbounded();
        (Self { tx }, rx)
    }

    fn send(&self, event: Navigation) {
        if self.tx.send(event).is_err() {
            debug!("Navigation receiver gone, event dropped");
        }
    }
}

impl Navigator for ChannelNavigator {
    fn on_eyes_captured(&self, bundle: &EyeBundle) {
        info!("Captured {} eye pairs", bundle.len());
        self.send(Navigation::Captured(bundle.len()));
    }

    fn on_verified(&self, batch: ResultBatch) {
        info!(
            "Verified {} pairs in {} hundredths of a second",
            batch.len(),
            batch.verification_time()
        );
        self.send(Navigation::Verified(batch));
    }

    fn on_failed(&self, error: &InferenceError) {
        warn!("Verification failed: {error}");
        self.send(Navigation::Failed(error.to_string()));
    }
}

/// State sink that logs steadiness changes.
#[derive(Debug, Default)]
pub struct LoggingStateSink;

impl StateSink for LoggingStateSink {
    fn post(&self, state: StabilityState) {
        info!("Device is {state:?}");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_display_records_settings() {
        let display = HeadlessDisplay::new();
        display.set_default_buffer_size(Size::new(640, 480));
        display.set_aspect_ratio(3, 4);
        display.set_transform(&DisplayTransform::identity());

        let state = display.state();
        assert_eq!(state.buffer_size, Some(Size::new(640, 480)));
        assert_eq!(state.aspect, Some((3, 4)));
        assert_eq!(state.transform, Some(DisplayTransform::identity()));
    }

    #[test]
    fn test_host_finish() {
        let host = HeadlessHost::default();
        assert!(!host.is_finished());
        host.finish();
        assert!(host.is_finished());
    }

    #[test]
    fn test_navigator_forwards_events() {
        let (nav, rx) = ChannelNavigator::new();
        nav.on_verified(ResultBatch::new(Vec::new(), Duration::from_millis(120)));
        nav.on_failed(&InferenceError::NotInitialized);

        assert!(
            matches!(rx.try_recv(), Ok(Navigation::Verified(b)) if b.verification_time() == 12)
        );
        assert!(matches!(rx.try_recv(), Ok(Navigation::Failed(_))));
    }
}
