//! Eye-state inference using Candle.
//!
//! Loads a multi-scale network from safetensors once, turns eye bitmaps into
//! normalized crops and scores batches of eye pairs.

mod device;
mod engine;
mod loader;
mod network;
mod preprocess;
mod verify;

pub use device::inference_device;
pub use engine::{EngineConfig, InferenceEngine, DEFAULT_NUM_CLASSES};
pub use loader::{load_labels, load_safetensors};
pub use network::{parameter_shapes, MultiScaleEyeNet, ScoringGraph};
pub use preprocess::{build_eye_tensors, crop_at_scale, luminance};
pub use verify::verify;
