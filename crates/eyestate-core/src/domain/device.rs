//! Capture device descriptions reported by a camera provider.

use serde::{Deserialize, Serialize};

use super::Size;

/// Direction a camera lens faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LensFacing {
    /// Same side as the display.
    Front,
    /// Opposite side from the display.
    Back,
    /// Externally attached camera.
    External,
}

/// Pixel layout of a frame-delivery stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// Planar YUV 4:2:0 (Y, then U, then V).
    Yuv420,
    /// Compressed still images.
    Jpeg,
    /// Interleaved RGBA, 8 bits per channel.
    Rgba8888,
}

/// Output sizes a device supports for one pixel format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFormat {
    /// Pixel format.
    pub format: PixelFormat,
    /// Supported sizes, in the order the device lists them.
    pub sizes: Vec<Size>,
}

/// A capture device and its capabilities. Immutable once queried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureDevice {
    /// Provider-specific identifier.
    pub id: String,
    /// Lens direction.
    pub facing: LensFacing,
    /// Sizes per frame-delivery pixel format.
    pub formats: Vec<StreamFormat>,
    /// Sizes compatible with an on-screen display surface.
    pub display_sizes: Vec<Size>,
}

impl CaptureDevice {
    /// Creates a device with no advertised outputs.
    #[must_use]
    pub fn new(id: impl Into<String>, facing: LensFacing) -> Self {
        Self {
            id: id.into(),
            facing,
            formats: Vec::new(),
            display_sizes: Vec::new(),
        }
    }

    /// Adds the sizes supported for `format`.
    #[must_use]
    pub fn with_format(mut self, format: PixelFormat, sizes: Vec<Size>) -> Self {
        self.formats.push(StreamFormat { format, sizes });
        self
    }

    /// Sets the display-compatible sizes.
    #[must_use]
    pub fn with_display_sizes(mut self, sizes: Vec<Size>) -> Self {
        self.display_sizes = sizes;
        self
    }

    /// Sizes supported for `format`, empty if the format is not offered.
    #[must_use]
    pub fn sizes_for(&self, format: PixelFormat) -> &[Size] {
        self.formats
            .iter()
            .find(|f| f.format == format)
            .map_or(&[], |f| f.sizes.as_slice())
    }

    /// Pixel formats this device can deliver.
    pub fn pixel_formats(&self) -> impl Iterator<Item = PixelFormat> + '_ {
        self.formats.iter().map(|f| f.format)
    }
}
