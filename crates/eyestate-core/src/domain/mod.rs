//! Core domain types for capture and eye-state verification.

mod device;
mod eye;
mod frame;
mod geometry;
mod result;
mod stability;

pub use device::{CaptureDevice, LensFacing, PixelFormat, StreamFormat};
pub use eye::{
    Eye, EyeBitmap, EyeBundle, EyeCrop, EyePair, EyeTensors, MultiScaleCrop, Scale, SCALES,
};
pub use frame::{write_yuv420, yuv420_len, BufferPool, Frame, PooledBuffer};
pub use geometry::{ChosenResolution, DisplayRotation, Orientation, ParseSizeError, Size};
pub use result::{InferenceResult, ResultBatch, ScoreVector, BATCH_SIZE};
pub use stability::{SensorReading, StabilityState};
