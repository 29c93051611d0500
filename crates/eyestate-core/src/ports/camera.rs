//! Camera framework port.
//!
//! Device lifecycle callbacks are delivered as [`SessionEvent`] messages on a
//! channel, so the adapter never calls back into the session state machine
//! directly.

use std::fmt;

use crossbeam_channel::Sender;

use crate::camera::DisplayTransform;
use crate::domain::{CaptureDevice, Frame, PixelFormat, Size};
use crate::error::CaptureError;

/// Identifies a destination surface for captured images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

/// Lifecycle callbacks from a device or streaming session.
pub enum SessionEvent {
    /// The device finished opening.
    Opened(Box<dyn DeviceHandle>),
    /// The device went away.
    Disconnected,
    /// The device reported an error.
    Error {
        /// Platform error code.
        code: i32,
    },
    /// The streaming session is ready for requests.
    Configured(Box<dyn StreamingSession>),
    /// The streaming session could not be set up.
    ConfigureFailed,
}

impl fmt::Debug for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Opened(device) => f.debug_tuple("Opened").field(&device.id()).finish(),
            Self::Disconnected => f.write_str("Disconnected"),
            Self::Error { code } => f.debug_struct("Error").field("code", code).finish(),
            Self::Configured(_) => f.write_str("Configured"),
            Self::ConfigureFailed => f.write_str("ConfigureFailed"),
        }
    }
}

/// Channel on which an adapter posts [`SessionEvent`]s.
pub type SessionEvents = Sender<SessionEvent>;

/// Base settings a request starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestTemplate {
    /// Continuous preview.
    Preview,
    /// Single still capture.
    StillCapture,
}

/// Autofocus behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoFocusMode {
    /// Fixed focus.
    Off,
    /// Single sweep on trigger.
    Auto,
    /// Continuously refocus, tuned for stills.
    ContinuousPicture,
    /// Continuously refocus, tuned for video.
    ContinuousVideo,
}

/// Auto-exposure behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoExposureMode {
    /// Manual exposure.
    Off,
    /// Auto exposure, flash off.
    On,
    /// Auto exposure, flash fired when needed.
    OnAutoFlash,
}

/// A capture request sent to a streaming session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    /// Base template.
    pub template: RequestTemplate,
    /// Surfaces that receive each captured image.
    pub targets: Vec<SurfaceId>,
    /// Autofocus mode.
    pub af_mode: AutoFocusMode,
    /// Auto-exposure mode.
    pub ae_mode: AutoExposureMode,
}

impl CaptureRequest {
    /// Preview request with continuous autofocus and automatic flash.
    #[must_use]
    pub fn preview(targets: Vec<SurfaceId>) -> Self {
        Self {
            template: RequestTemplate::Preview,
            targets,
            af_mode: AutoFocusMode::ContinuousPicture,
            ae_mode: AutoExposureMode::OnAutoFlash,
        }
    }
}

/// Parameters of an off-screen frame reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Frame size.
    pub size: Size,
    /// Pixel layout.
    pub format: PixelFormat,
    /// Buffers the reader may have in flight.
    pub max_images: usize,
}

/// Enumerates and opens capture devices.
pub trait CameraProvider: Send + Sync {
    /// Lists available devices.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::UnsupportedDevice`] if the capture API is unavailable.
    fn devices(&self) -> Result<Vec<CaptureDevice>, CaptureError>;

    /// Starts opening `device_id`. Completion arrives as [`SessionEvent::Opened`].
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be issued.
    fn open_device(&self, device_id: &str, events: SessionEvents) -> Result<(), CaptureError>;

    /// Creates an off-screen reader that delivers frames to `frames`.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader cannot be allocated.
    fn create_reader(
        &self,
        config: ReaderConfig,
        frames: Sender<Frame>,
    ) -> Result<Box<dyn FrameReader>, CaptureError>;
}

/// An open capture device.
pub trait DeviceHandle: Send {
    /// Device identifier.
    fn id(&self) -> &str;

    /// Starts configuring a streaming session over `outputs`.
    /// Completion arrives as [`SessionEvent::Configured`] or [`SessionEvent::ConfigureFailed`].
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be issued.
    fn create_session(
        &mut self,
        outputs: &[SurfaceId],
        events: SessionEvents,
    ) -> Result<(), CaptureError>;

    /// Releases the device.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform refuses to release it.
    fn close(&mut self) -> Result<(), CaptureError>;
}

/// A configured streaming session.
pub trait StreamingSession: Send {
    /// Replaces the standing request.
    ///
    /// # Errors
    ///
    /// Returns an error if the device rejects the request.
    fn set_repeating_request(&mut self, request: &CaptureRequest) -> Result<(), CaptureError>;

    /// Stops streaming and releases the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform refuses to release it.
    fn close(&mut self) -> Result<(), CaptureError>;
}

/// Off-screen frame destination.
pub trait FrameReader: Send {
    /// Surface to target in capture requests.
    fn surface(&self) -> SurfaceId;

    /// Releases the reader and its buffers.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform refuses to release it.
    fn close(&mut self) -> Result<(), CaptureError>;
}

/// On-screen preview surface.
pub trait DisplaySurface: Send + Sync {
    /// Surface to target in capture requests.
    fn surface(&self) -> SurfaceId;

    /// Sets the size of buffers the camera renders into.
    fn set_default_buffer_size(&self, size: Size);

    /// Constrains the view to the given aspect ratio.
    fn set_aspect_ratio(&self, width: u32, height: u32);

    /// Applies a buffer-to-view transform.
    fn set_transform(&self, transform: &DisplayTransform);
}

/// Receives teardown notifications for frame consumers.
pub trait PreviewListener: Send + Sync {
    /// Drops any per-session state.
    fn deinitialize(&self);
}
