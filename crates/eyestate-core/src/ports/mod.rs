//! Port definitions for hexagonal architecture.
//!
//! These traits define the boundaries between the capture/verification core
//! and the platform: camera framework, display, sensors and navigation.

mod camera;
mod extractor;
mod host;
mod navigation;
mod sensor;

pub use camera::{
    AutoExposureMode, AutoFocusMode, CameraProvider, CaptureRequest, DeviceHandle, DisplaySurface,
    FrameReader, PreviewListener, ReaderConfig, RequestTemplate, SessionEvent, SessionEvents,
    StreamingSession, SurfaceId,
};
pub use extractor::EyeRegionExtractor;
pub use host::HostContext;
pub use navigation::Navigator;
pub use sensor::{StabilityClassifier, StateSink};
