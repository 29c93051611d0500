//! Navigation port: where captured and verified batches go.

use crate::domain::{EyeBundle, ResultBatch};
use crate::error::InferenceError;

/// Receives batches as they leave the pipeline.
pub trait Navigator: Send + Sync {
    /// A full batch of eye pairs has been captured.
    fn on_eyes_captured(&self, bundle: &EyeBundle);

    /// The batch has been scored.
    fn on_verified(&self, batch: ResultBatch);

    /// Scoring the batch failed.
    fn on_failed(&self, error: &InferenceError);
}
