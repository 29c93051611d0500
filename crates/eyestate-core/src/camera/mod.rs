//! Camera side of the pipeline: capability probing, the open/close permit,
//! the capture session state machine and the preview transform.

mod lock;
mod prober;
mod session;
mod transform;

pub use lock::{OpenCloseLock, Permit, DEFAULT_LOCK_TIMEOUT};
pub use prober::{
    choose_optimal_size, largest_by_area, select_device, CapabilityProber, ProbeConfig,
    ProbeOutcome, MINIMUM_PREVIEW_SIZE,
};
pub use session::{CaptureSession, SessionConfig, SessionPorts, SessionState};
pub use transform::{configure_transform, DisplayTransform, Matrix, RectF};
