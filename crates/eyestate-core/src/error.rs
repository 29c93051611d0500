//! Error taxonomy for capture and inference.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::camera::SessionState;
use crate::domain::Scale;

/// Operation guarded by the open/close permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOperation {
    /// Opening a device.
    Open,
    /// Closing a device.
    Close,
}

impl fmt::Display for LockOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Open => "opening",
            Self::Close => "closing",
        })
    }
}

/// Failures of the camera side of the pipeline.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The capture API or the requested lens is not available.
    #[error("unsupported capture device: {0}")]
    UnsupportedDevice(String),

    /// The open/close permit could not be taken in time.
    #[error("timed out after {waited:?} waiting to lock camera {operation}")]
    LockTimeout {
        /// What the caller was trying to do.
        operation: LockOperation,
        /// How long it waited.
        waited: Duration,
    },

    /// An open was requested while a session is already in flight.
    #[error("capture session is already {state}")]
    AlreadyOpen {
        /// State at the time of the request.
        state: SessionState,
    },

    /// The streaming session could not be configured. Preview stays inactive.
    #[error("capture session configuration failed: {0}")]
    SessionConfiguration(String),

    /// The device reported a hardware error.
    #[error("camera device error (code {code})")]
    Device {
        /// Platform error code.
        code: i32,
    },

    /// Any other platform failure.
    #[error(transparent)]
    Platform(#[from] anyhow::Error),
}

/// Failures of the scoring side of the pipeline.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// `score_eyes` was called before `initialize`.
    #[error("inference engine is not initialized")]
    NotInitialized,

    /// `initialize` was called a second time.
    #[error("inference engine is already initialized")]
    AlreadyInitialized,

    /// A model or label asset could not be loaded.
    #[error("failed to load asset {}", path.display())]
    Asset {
        /// Asset path.
        path: PathBuf,
        /// Underlying cause.
        #[source]
        source: anyhow::Error,
    },

    /// An input crop had the wrong number of values.
    #[error("{scale:?} crop expects {expected} values, got {actual}")]
    ShapeMismatch {
        /// Scale the crop was fed at.
        scale: Scale,
        /// Expected value count.
        expected: usize,
        /// Actual value count.
        actual: usize,
    },

    /// The graph produced a different class count than configured.
    #[error("graph produced {actual} classes, expected {expected}")]
    ClassCount {
        /// Configured class count.
        expected: usize,
        /// Class count of the output tensor.
        actual: usize,
    },

    /// Verification needs a full batch of eye pairs.
    #[error("verification needs {expected} eye pairs, got {actual}")]
    IncompleteBatch {
        /// Batch size.
        expected: usize,
        /// Pairs supplied.
        actual: usize,
    },

    /// The forward pass failed.
    #[error("graph execution failed: {0}")]
    Failure(#[from] candle_core::Error),
}
