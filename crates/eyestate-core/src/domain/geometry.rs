//! Sizes, chosen resolutions and display rotation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A width × height pair in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Size {
    /// Creates a new size.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Area in pixels, widened so large sensors cannot overflow.
    #[must_use]
    pub const fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Width divided by height, `0.0` for a degenerate size.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn aspect_ratio(self) -> f32 {
        if self.height == 0 {
            0.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    /// Swaps width and height.
    #[must_use]
    pub const fn transposed(self) -> Self {
        Self::new(self.height, self.width)
    }

    /// True if both dimensions are at least `minimum`.
    #[must_use]
    pub const fn covers(self, minimum: u32) -> bool {
        self.width >= minimum && self.height >= minimum
    }

    /// True if the view is wider than it is tall.
    #[must_use]
    pub const fn is_landscape(self) -> bool {
        self.width > self.height
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Error returned when a `WIDTHxHEIGHT` string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid size '{0}', expected WIDTHxHEIGHT")]
pub struct ParseSizeError(String);

impl FromStr for Size {
    type Err = ParseSizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .trim()
            .split_once(|c: char| c.eq_ignore_ascii_case(&'x'))
            .ok_or_else(|| ParseSizeError(s.to_string()))?;
        let width = w.parse().map_err(|_| ParseSizeError(s.to_string()))?;
        let height = h.parse().map_err(|_| ParseSizeError(s.to_string()))?;
        Ok(Self::new(width, height))
    }
}

/// Capture resolution picked for one camera-open cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChosenResolution {
    /// Selected output size.
    pub size: Size,
    /// Width / height of `size`.
    pub aspect_ratio: f32,
}

impl ChosenResolution {
    /// Wraps a size, deriving its aspect ratio.
    #[must_use]
    pub fn new(size: Size) -> Self {
        Self {
            size,
            aspect_ratio: size.aspect_ratio(),
        }
    }
}

/// Screen orientation of the hosting view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// Taller than wide.
    Portrait,
    /// Wider than tall.
    Landscape,
}

/// Rotation of the display relative to its natural orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DisplayRotation {
    /// Natural orientation.
    #[default]
    Rotation0,
    /// Rotated a quarter turn.
    Rotation90,
    /// Upside down.
    Rotation180,
    /// Rotated three quarter turns.
    Rotation270,
}

impl DisplayRotation {
    /// Quarter-turn index (0..=3).
    #[must_use]
    pub const fn index(self) -> i32 {
        match self {
            Self::Rotation0 => 0,
            Self::Rotation90 => 1,
            Self::Rotation180 => 2,
            Self::Rotation270 => 3,
        }
    }

    /// Rotation in degrees.
    #[must_use]
    pub const fn degrees(self) -> u32 {
        match self {
            Self::Rotation0 => 0,
            Self::Rotation90 => 90,
            Self::Rotation180 => 180,
            Self::Rotation270 => 270,
        }
    }

    /// Parses a multiple of 90 degrees.
    #[must_use]
    pub const fn from_degrees(degrees: u32) -> Option<Self> {
        match degrees % 360 {
            0 => Some(Self::Rotation0),
            90 => Some(Self::Rotation90),
            180 => Some(Self::Rotation180),
            270 => Some(Self::Rotation270),
            _ => None,
        }
    }

    /// Orientation a still image must be tagged with for this display rotation.
    #[must_use]
    pub const fn sensor_orientation(self) -> u32 {
        match self {
            Self::Rotation0 => 90,
            Self::Rotation90 => 0,
            Self::Rotation180 => 270,
            Self::Rotation270 => 180,
        }
    }

    /// True for the two sideways rotations.
    #[must_use]
    pub const fn is_sideways(self) -> bool {
        matches!(self, Self::Rotation90 | Self::Rotation270)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!("640x480".parse::<Size>(), Ok(Size::new(640, 480)));
        assert_eq!(" 1280X720 ".parse::<Size>(), Ok(Size::new(1280, 720)));
        assert!("640".parse::<Size>().is_err());
        assert!("axb".parse::<Size>().is_err());
    }

    #[test]
    fn test_area_does_not_overflow() {
        let huge = Size::new(u32::MAX, 2);
        assert_eq!(huge.area(), u64::from(u32::MAX) * 2);
    }

    #[test]
    fn test_rotation_round_trip_degrees() {
        for rotation in [
            DisplayRotation::Rotation0,
            DisplayRotation::Rotation90,
            DisplayRotation::Rotation180,
            DisplayRotation::Rotation270,
        ] {
            assert_eq!(DisplayRotation::from_degrees(rotation.degrees()), Some(rotation));
        }
        assert_eq!(DisplayRotation::from_degrees(45), None);
    }

    #[test]
    fn test_sensor_orientation_table() {
        assert_eq!(DisplayRotation::Rotation0.sensor_orientation(), 90);
        assert_eq!(DisplayRotation::Rotation90.sensor_orientation(), 0);
        assert_eq!(DisplayRotation::Rotation180.sensor_orientation(), 270);
        assert_eq!(DisplayRotation::Rotation270.sensor_orientation(), 180);
    }
}
