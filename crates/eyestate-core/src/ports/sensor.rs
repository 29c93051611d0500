//! Sensor classification and UI state ports.

use crate::domain::{SensorReading, StabilityState};

/// Turns raw sensor readings into a steadiness verdict.
pub trait StabilityClassifier: Send {
    /// Folds in a reading, returning the current verdict once one is known.
    fn classify(&mut self, reading: &SensorReading) -> Option<StabilityState>;
}

/// UI-side receiver of steadiness changes.
pub trait StateSink: Send + Sync {
    /// Posts a new state to the UI thread.
    fn post(&self, state: StabilityState);
}
