//! Capture session state machine.
//!
//! `Closed → Opening → Configuring → Active → Closed`, with `Error` reachable
//! from any in-flight state. Platform callbacks arrive as [`SessionEvent`]s
//! and are applied through [`CaptureSession::handle_event`] on the session
//! worker.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crossbeam_channel::Sender;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::lock::{OpenCloseLock, Permit, DEFAULT_LOCK_TIMEOUT};
use super::transform::{configure_transform, DisplayTransform};
use crate::domain::{ChosenResolution, DisplayRotation, Frame, PixelFormat, Size};
use crate::error::{CaptureError, LockOperation};
use crate::ports::{
    CameraProvider, CaptureRequest, DeviceHandle, DisplaySurface, FrameReader, HostContext,
    PreviewListener, ReaderConfig, SessionEvent, SessionEvents, StreamingSession,
};

/// Lifecycle state of a [`CaptureSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No device is open.
    #[default]
    Closed,
    /// Waiting for the device to open.
    Opening,
    /// Device open, waiting for the streaming session.
    Configuring,
    /// Repeating request running.
    Active,
    /// The device failed; the host has been asked to finish.
    Error,
}

impl SessionState {
    /// True if a new open may start from this state.
    #[must_use]
    pub const fn can_open(self) -> bool {
        matches!(self, Self::Closed | Self::Error)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Closed => "closed",
            Self::Opening => "opening",
            Self::Configuring => "configuring",
            Self::Active => "active",
            Self::Error => "error",
        })
    }
}

/// Tunables for a [`CaptureSession`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Longest an open or close waits for the permit.
    pub lock_timeout: Duration,
    /// Buffers the frame reader may have in flight.
    pub max_images: usize,
    /// Frame reader pixel layout.
    pub frame_format: PixelFormat,
    /// Replaces the computed preview transform with a fixed translation.
    pub legacy_translate: Option<(f32, f32)>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            max_images: 2,
            frame_format: PixelFormat::Yuv420,
            legacy_translate: None,
        }
    }
}

/// Platform collaborators of a [`CaptureSession`].
#[derive(Clone)]
pub struct SessionPorts {
    /// Device enumeration and reader allocation.
    pub provider: Arc<dyn CameraProvider>,
    /// On-screen preview.
    pub display: Arc<dyn DisplaySurface>,
    /// Finished after an unrecoverable device error.
    pub host: Arc<dyn HostContext>,
    /// Deinitialized whenever the session tears down.
    pub listener: Arc<dyn PreviewListener>,
}

#[derive(Default)]
struct Inner {
    state: SessionState,
    pending: Option<Permit>,
    resolution: Option<ChosenResolution>,
    device: Option<Box<dyn DeviceHandle>>,
    session: Option<Box<dyn StreamingSession>>,
    reader: Option<Box<dyn FrameReader>>,
    request: Option<CaptureRequest>,
    transform: Option<DisplayTransform>,
}

/// Owns at most one device, streaming session and frame reader.
pub struct CaptureSession {
    config: SessionConfig,
    ports: SessionPorts,
    events: SessionEvents,
    frames: Sender<Frame>,
    lock: OpenCloseLock,
    inner: Mutex<Inner>,
}

impl CaptureSession {
    /// Creates a closed session. Platform callbacks must be posted to `events`;
    /// captured frames are delivered to `frames`.
    #[must_use]
    pub fn new(
        config: SessionConfig,
        ports: SessionPorts,
        events: SessionEvents,
        frames: Sender<Frame>,
    ) -> Self {
        let lock = OpenCloseLock::new(config.lock_timeout);
        Self {
            config,
            ports,
            events,
            frames,
            lock,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.inner().state
    }

    /// Resolution of the current open cycle.
    #[must_use]
    pub fn resolution(&self) -> Option<ChosenResolution> {
        self.inner().resolution
    }

    /// Standing request, once streaming has started.
    #[must_use]
    pub fn request(&self) -> Option<CaptureRequest> {
        self.inner().request.clone()
    }

    /// Last transform applied to the display.
    #[must_use]
    pub fn transform(&self) -> Option<DisplayTransform> {
        self.inner().transform
    }

    /// The open/close permit.
    #[must_use]
    pub const fn lock(&self) -> &OpenCloseLock {
        &self.lock
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Replaces the chosen resolution after a surface size change.
    pub fn set_resolution(&self, resolution: ChosenResolution) {
        debug!("Capture resolution set to {}", resolution.size);
        self.inner().resolution = Some(resolution);
    }

    /// Starts opening `device_id` at `resolution`.
    ///
    /// The permit stays held until [`Self::on_opened`] or a teardown.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::AlreadyOpen`] unless the session is closed,
    /// [`CaptureError::LockTimeout`] if a close is still in progress, or the
    /// provider's error if the open request cannot be issued.
    pub fn open(&self, device_id: &str, resolution: ChosenResolution) -> Result<(), CaptureError> {
        let state = self.state();
        if !state.can_open() {
            return Err(CaptureError::AlreadyOpen { state });
        }

        let permit = self.lock.acquire(LockOperation::Open)?;

        let mut inner = self.inner();
        if !inner.state.can_open() {
            return Err(CaptureError::AlreadyOpen { state: inner.state });
        }
        inner.state = SessionState::Opening;
        inner.resolution = Some(resolution);
        inner.pending = Some(permit);

        info!("Opening camera {device_id} at {}", resolution.size);
        if let Err(e) = self.ports.provider.open_device(device_id, self.events.clone()) {
            inner.state = SessionState::Closed;
            inner.pending = None;
            return Err(e);
        }
        Ok(())
    }

    /// The device finished opening.
    ///
    /// # Errors
    ///
    /// Returns the provider's error if the frame reader cannot be created or
    /// the session request cannot be issued. The session moves to `Error`.
    pub fn on_opened(&self, mut device: Box<dyn DeviceHandle>) -> Result<(), CaptureError> {
        let mut inner = self.inner();
        inner.pending = None;

        if inner.state != SessionState::Opening {
            debug!("Device {} opened in state {}, closing it", device.id(), inner.state);
            close_quietly("device", device.close());
            return Ok(());
        }

        let size = inner.resolution.map_or(Size::new(0, 0), |r| r.size);
        info!("Camera {} opened", device.id());
        inner.state = SessionState::Configuring;

        match self.start_session(device.as_mut(), size) {
            Ok(reader) => {
                inner.device = Some(device);
                inner.reader = Some(reader);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to start session on camera {}: {e}", device.id());
                inner.state = SessionState::Error;
                drop(inner);
                close_quietly("device", device.close());
                Err(e)
            }
        }
    }

    fn start_session(
        &self,
        device: &mut dyn DeviceHandle,
        size: Size,
    ) -> Result<Box<dyn FrameReader>, CaptureError> {
        let mut reader = self.ports.provider.create_reader(
            ReaderConfig {
                size,
                format: self.config.frame_format,
                max_images: self.config.max_images,
            },
            self.frames.clone(),
        )?;
        self.ports.display.set_default_buffer_size(size);

        let outputs = [self.ports.display.surface(), reader.surface()];
        if let Err(e) = device.create_session(&outputs, self.events.clone()) {
            close_quietly("reader", reader.close());
            return Err(e);
        }
        Ok(reader)
    }

    /// The streaming session is ready. Starts the repeating preview request.
    pub fn on_configured(&self, mut session: Box<dyn StreamingSession>) {
        let mut inner = self.inner();
        if inner.device.is_none() {
            debug!("Session configured after the device closed");
            close_quietly("session", session.close());
            return;
        }

        let mut targets = vec![self.ports.display.surface()];
        targets.extend(inner.reader.as_ref().map(|r| r.surface()));
        let request = CaptureRequest::preview(targets);

        match session.set_repeating_request(&request) {
            Ok(()) => {
                inner.state = SessionState::Active;
                inner.request = Some(request);
                info!("Preview streaming");
            }
            Err(e) => warn!("Failed to start repeating request: {e}"),
        }
        if let Some(mut previous) = inner.session.replace(session) {
            debug!("Replacing a configured session");
            close_quietly("session", previous.close());
        }
    }

    /// The streaming session could not be configured.
    pub fn on_configure_failed(&self) {
        let state = self.state();
        warn!(
            "{}",
            CaptureError::SessionConfiguration(format!("preview stays {state}"))
        );
    }

    /// The device went away.
    pub fn on_disconnected(&self) {
        info!("Camera disconnected");
        self.teardown(SessionState::Closed);
        self.ports.listener.deinitialize();
    }

    /// The device reported an unrecoverable error. Finishes the host.
    ///
    /// # Errors
    ///
    /// Always returns [`CaptureError::Device`] carrying `code`.
    pub fn on_error(&self, code: i32) -> Result<(), CaptureError> {
        warn!("Camera error {code}");
        self.teardown(SessionState::Error);
        self.ports.listener.deinitialize();
        self.ports.host.finish();
        Err(CaptureError::Device { code })
    }

    /// Releases session, device and reader, in that order.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::LockTimeout`] if an open is still pending
    /// past the lock timeout.
    pub fn close(&self) -> Result<(), CaptureError> {
        let permit = self.lock.acquire(LockOperation::Close)?;
        self.teardown(SessionState::Closed);
        self.ports.listener.deinitialize();
        drop(permit);
        info!("Camera closed");
        Ok(())
    }

    fn teardown(&self, state: SessionState) {
        let (session, device, reader) = {
            let mut inner = self.inner();
            inner.pending = None;
            inner.state = state;
            inner.request = None;
            (inner.session.take(), inner.device.take(), inner.reader.take())
        };

        if let Some(mut session) = session {
            close_quietly("session", session.close());
        }
        if let Some(mut device) = device {
            close_quietly("device", device.close());
        }
        if let Some(mut reader) = reader {
            close_quietly("reader", reader.close());
        }
    }

    /// Computes and applies the preview transform for a `view` at `rotation`.
    ///
    /// Returns `None` before a resolution has been chosen.
    pub fn configure_transform(
        &self,
        view: Size,
        rotation: DisplayRotation,
    ) -> Option<DisplayTransform> {
        let mut inner = self.inner();
        let reader = inner.resolution?.size;
        let transform = configure_transform(view, reader, rotation, self.config.legacy_translate);
        self.ports.display.set_transform(&transform);
        inner.transform = Some(transform);
        debug!(
            "Preview transform for {view} at {}°: scale {:.3}, rotation {}°",
            rotation.degrees(),
            transform.fill_scale,
            transform.rotation_degrees
        );
        Some(transform)
    }

    /// Applies a platform callback.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`Self::on_opened`] and [`Self::on_error`].
    pub fn handle_event(&self, event: SessionEvent) -> Result<(), CaptureError> {
        debug!("Session event {event:?}");
        match event {
            SessionEvent::Opened(device) => self.on_opened(device),
            SessionEvent::Disconnected => {
                self.on_disconnected();
                Ok(())
            }
            SessionEvent::Error { code } => self.on_error(code),
            SessionEvent::Configured(session) => {
                self.on_configured(session);
                Ok(())
            }
            SessionEvent::ConfigureFailed => {
                self.on_configure_failed();
                Ok(())
            }
        }
    }
}

fn close_quietly(what: &str, result: Result<(), CaptureError>) {
    if let Err(e) = result {
        warn!("Failed to release {what}: {e}");
    }
}
