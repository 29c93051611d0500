//! Device steadiness from gyroscope and ambient light readings.

use std::sync::Arc;

use tracing::debug;

use crate::domain::{SensorReading, StabilityState};
use crate::ports::{StabilityClassifier, StateSink};

/// Thresholds for [`ThresholdClassifier`].
#[derive(Debug, Clone)]
pub struct StabilityConfig {
    /// Largest rotation rate magnitude, in rad/s, still considered steady.
    pub max_rotation_rate: f32,
    /// Dimmest ambient light, in lux, still considered usable.
    pub min_lux: f32,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            max_rotation_rate: 0.3,
            min_lux: 10.0,
        }
    }
}

/// Unstable while the device rotates too fast or the scene is too dark.
#[derive(Debug, Clone, Default)]
pub struct ThresholdClassifier {
    config: StabilityConfig,
    moving: bool,
    dark: bool,
}

impl ThresholdClassifier {
    /// Creates a classifier that starts out steady.
    #[must_use]
    pub const fn new(config: StabilityConfig) -> Self {
        Self {
            config,
            moving: false,
            dark: false,
        }
    }
}

impl StabilityClassifier for ThresholdClassifier {
    fn classify(&mut self, reading: &SensorReading) -> Option<StabilityState> {
        match *reading {
            SensorReading::Gyroscope { x, y, z } => {
                let rate = (x * x + y * y + z * z).sqrt();
                if !rate.is_finite() {
                    return None;
                }
                self.moving = rate > self.config.max_rotation_rate;
            }
            SensorReading::Light { lux } => {
                if !lux.is_finite() {
                    return None;
                }
                self.dark = lux < self.config.min_lux;
            }
        }
        Some(if self.moving || self.dark {
            StabilityState::Unstable
        } else {
            StabilityState::Steady
        })
    }
}

/// Feeds readings through a classifier and posts state changes.
pub struct StabilityMonitor {
    classifier: Box<dyn StabilityClassifier>,
    sink: Arc<dyn StateSink>,
    last: Option<StabilityState>,
}

impl StabilityMonitor {
    /// Creates a monitor that has posted nothing yet.
    #[must_use]
    pub fn new(classifier: Box<dyn StabilityClassifier>, sink: Arc<dyn StateSink>) -> Self {
        Self {
            classifier,
            sink,
            last: None,
        }
    }

    /// Classifies `reading` and posts the state if it changed.
    pub fn on_reading(&mut self, reading: &SensorReading) {
        let Some(state) = self.classifier.classify(reading) else {
            return;
        };
        if self.last != Some(state) {
            debug!("Stability changed to {state:?}");
            self.sink.post(state);
            self.last = Some(state);
        }
    }

    /// Last posted state.
    #[must_use]
    pub const fn last(&self) -> Option<StabilityState> {
        self.last
    }
}
