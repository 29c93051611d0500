//! Eyestate Core - capture pipeline and eye-state inference
//!
//! This crate contains the domain types, the platform ports, the capture
//! session state machine, the worker pipeline and the multi-scale eye-state
//! network. It has no platform dependency; adapters live in
//! `eyestate-adapters`.

pub mod camera;
pub mod domain;
pub mod error;
pub mod inference;
pub mod pipeline;
pub mod ports;

pub use camera::{CapabilityProber, CaptureSession, SessionState};
pub use domain::{
    CaptureDevice, ChosenResolution, EyeBitmap, EyeBundle, EyePair, Frame, ResultBatch,
    ScoreVector, Size,
};
pub use error::{CaptureError, InferenceError};
pub use inference::InferenceEngine;
pub use pipeline::{CameraPipeline, PipelineConfig, PipelineParts};
