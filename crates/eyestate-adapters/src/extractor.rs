//! Fixed-offset eye region extractor.
//!
//! Crops two configured regions out of every frame. Intended for guided
//! capture where an on-screen overlay positions the subject's face.

// Region math converts between normalized f32 and pixel u32.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]

use eyestate_core::domain::{EyeBitmap, EyePair, Frame};
use eyestate_core::ports::EyeRegionExtractor;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A rectangle in normalized `[0, 1]` frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width.
    pub w: f32,
    /// Height.
    pub h: f32,
}

impl Region {
    /// Whether the region has positive area and lies inside the frame.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.w > 0.0
            && self.h > 0.0
            && self.x >= 0.0
            && self.y >= 0.0
            && self.x + self.w <= 1.0
            && self.y + self.h <= 1.0
    }

    /// Pixel rectangle `(x, y, w, h)` inside an image of `width` x `height`.
    ///
    /// Always at least one pixel, clamped to the image.
    #[must_use]
    pub fn to_pixels(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let (fw, fh) = (width as f32, height as f32);
        let px = ((self.x * fw) as u32).min(width.saturating_sub(1));
        let py = ((self.y * fh) as u32).min(height.saturating_sub(1));
        let pw = ((self.w * fw) as u32).min(width.saturating_sub(px)).max(1);
        let ph = ((self.h * fh) as u32).min(height.saturating_sub(py)).max(1);
        (px, py, pw, ph)
    }
}

/// Configuration for [`FixedRegionExtractor`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Subject's left eye, which appears on the right of an unmirrored frame.
    pub left: Region,
    /// Subject's right eye.
    pub right: Region,
    /// Minimum luma standard deviation in each crop. Flatter crops are
    /// treated as "no eyes".
    pub min_contrast: f32,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            left: Region {
                x: 0.55,
                y: 0.35,
                w: 0.2,
                h: 0.1,
            },
            right: Region {
                x: 0.25,
                y: 0.35,
                w: 0.2,
                h: 0.1,
            },
            min_contrast: 0.02,
        }
    }
}

/// Crops eyes from fixed frame positions.
pub struct FixedRegionExtractor {
    config: ExtractorConfig,
}

impl FixedRegionExtractor {
    /// Creates an extractor.
    #[must_use]
    pub const fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    fn crop(&self, image: &RgbaImage, region: &Region) -> Option<EyeBitmap> {
        let (x, y, w, h) = region.to_pixels(image.width(), image.height());
        let crop = image::imageops::crop_imm(image, x, y, w, h).to_image();
        let contrast = luma_std_dev(&crop);
        if contrast < self.config.min_contrast {
            debug!("Eye region at ({x}, {y}) too flat: {contrast:.4}");
            return None;
        }
        Some(EyeBitmap::new(crop))
    }
}

impl Default for FixedRegionExtractor {
    fn default() -> Self {
        Self::new(ExtractorConfig::default())
    }
}

impl EyeRegionExtractor for FixedRegionExtractor {
    fn extract(&self, frame: &Frame) -> anyhow::Result<Option<EyePair>> {
        if !self.config.left.is_valid() || !self.config.right.is_valid() {
            anyhow::bail!("Eye regions must lie inside the frame");
        }
        let image = frame.to_rgba();
        let Some(left) = self.crop(&image, &self.config.left) else {
            return Ok(None);
        };
        let Some(right) = self.crop(&image, &self.config.right) else {
            return Ok(None);
        };
        Ok(Some(EyePair { left, right }))
    }
}

/// Standard deviation of Rec. 601 luma, in `[0, 1]`.
fn luma_std_dev(image: &RgbaImage) -> f32 {
    let n = (image.width() * image.height()) as f32;
    if n == 0.0 {
        return 0.0;
    }
    let luma: Vec<f32> = image
        .pixels()
        .map(|p| {
            let [r, g, b, _] = p.0.map(f32::from);
            (0.299 * r + 0.587 * g + 0.114 * b) / 255.0
        })
        .collect();
    let mean = luma.iter().sum::<f32>() / n;
    (luma.iter().map(|l| (l - mean).powi(2)).sum::<f32>() / n).sqrt()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use eyestate_core::domain::{write_yuv420, yuv420_len, BufferPool, Size};
    use image::Rgba;
    use std::time::Duration;

    fn frame_of(image: &RgbaImage) -> Frame {
        let size = Size::new(image.width(), image.height());
        let pool = BufferPool::new(1, yuv420_len(size));
        let mut buffer = pool.try_acquire().unwrap();
        assert!(write_yuv420(image, &mut buffer));
        Frame::new(size, Duration::ZERO, buffer).unwrap()
    }

    fn striped(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, _| {
            if x % 4 < 2 {
                Rgba([20, 20, 20, 255])
            } else {
                Rgba([230, 230, 230, 255])
            }
        })
    }

    #[test]
    fn test_region_to_pixels_clamps() {
        let r = Region {
            x: 0.9,
            y: 0.9,
            w: 0.5,
            h: 0.5,
        };
        assert_eq!(r.to_pixels(100, 50), (90, 45, 10, 5));
        assert!(!r.is_valid());

        let tiny = Region {
            x: 0.0,
            y: 0.0,
            w: 0.001,
            h: 0.001,
        };
        assert_eq!(tiny.to_pixels(100, 50), (0, 0, 1, 1));
    }

    #[test]
    fn test_extracts_both_regions() {
        let extractor = FixedRegionExtractor::default();
        let pair = extractor
            .extract(&frame_of(&striped(200, 100)))
            .unwrap()
            .unwrap();
        assert_eq!((pair.left.width(), pair.left.height()), (40, 10));
        assert_eq!((pair.right.width(), pair.right.height()), (40, 10));
    }

    #[test]
    fn test_flat_frame_has_no_eyes() {
        let flat = RgbaImage::from_pixel(200, 100, Rgba([128, 128, 128, 255]));
        let extractor = FixedRegionExtractor::default();
        assert!(extractor.extract(&frame_of(&flat)).unwrap().is_none());
    }

    #[test]
    fn test_invalid_regions_error() {
        let mut config = ExtractorConfig::default();
        config.left.w = 0.0;
        let extractor = FixedRegionExtractor::new(config);
        assert!(extractor.extract(&frame_of(&striped(20, 20))).is_err());
    }
}
