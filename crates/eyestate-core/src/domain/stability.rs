//! Motion and light readings and the steadiness they imply.

use serde::Serialize;

/// One reading from a motion or light sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorReading {
    /// Rotation rate around each axis in rad/s.
    Gyroscope {
        /// X axis.
        x: f32,
        /// Y axis.
        y: f32,
        /// Z axis.
        z: f32,
    },
    /// Ambient illuminance in lux.
    Light {
        /// Illuminance.
        lux: f32,
    },
}

/// Whether the device is held still enough, in good enough light, to capture eyes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StabilityState {
    /// Capture conditions are good.
    Steady,
    /// The device is moving or the scene is too dark.
    Unstable,
}
