//! Eye bitmap to network input conversion.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use image::imageops::{self, FilterType};
use image::Rgba;

use crate::domain::{EyeBitmap, EyeCrop, EyeTensors, MultiScaleCrop, Scale};
use crate::error::InferenceError;

/// Grayscale intensity in `[0, 1]`: rounded BT.601 luma over 255.
#[must_use]
pub fn luminance(pixel: Rgba<u8>) -> f32 {
    let [r, g, b, _] = pixel.0.map(f32::from);
    let luma = (0.299 * r + 0.587 * g + 0.114 * b).round().clamp(0.0, 255.0) as u8;
    f32::from(luma) / 255.0
}

/// Resizes `bitmap` to `scale` and normalizes it, row-major.
///
/// # Errors
///
/// Returns [`InferenceError::ShapeMismatch`] if the resized image does not
/// match the scale shape.
pub fn crop_at_scale(bitmap: &EyeBitmap, scale: Scale) -> Result<EyeCrop, InferenceError> {
    let image = bitmap.image();
    let (width, height) = (scale.width() as u32, scale.height() as u32);
    let data = if image.width() == width && image.height() == height {
        image.pixels().map(|&p| luminance(p)).collect()
    } else {
        imageops::resize(image, width, height, FilterType::Triangle)
            .pixels()
            .map(|&p| luminance(p))
            .collect()
    };
    EyeCrop::new(scale, data)
}

fn multi_scale(bitmap: &EyeBitmap) -> Result<MultiScaleCrop, InferenceError> {
    MultiScaleCrop::new(
        crop_at_scale(bitmap, Scale::Low)?,
        crop_at_scale(bitmap, Scale::Mid)?,
        crop_at_scale(bitmap, Scale::High)?,
    )
}

/// Builds the six network inputs for one eye pair.
///
/// # Errors
///
/// Returns [`InferenceError::ShapeMismatch`] if a crop cannot be formed.
pub fn build_eye_tensors(
    left: &EyeBitmap,
    right: &EyeBitmap,
) -> Result<EyeTensors, InferenceError> {
    Ok(EyeTensors {
        right: multi_scale(right)?,
        left: multi_scale(left)?,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use image::RgbaImage;

    #[test]
    fn test_luminance_endpoints() {
        assert!((luminance(Rgba([255, 255, 255, 255])) - 1.0).abs() < f32::EPSILON);
        assert!(luminance(Rgba([0, 0, 0, 255])).abs() < f32::EPSILON);
    }

    #[test]
    fn test_luminance_weights_green_heaviest() {
        let r = luminance(Rgba([255, 0, 0, 255]));
        let g = luminance(Rgba([0, 255, 0, 255]));
        let b = luminance(Rgba([0, 0, 255, 255]));
        assert!(g > r && r > b);
        assert!((r - 76.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_luminance_ignores_alpha() {
        assert_eq!(luminance(Rgba([10, 20, 30, 0])), luminance(Rgba([10, 20, 30, 255])));
    }

    #[test]
    fn test_build_eye_tensors_resizes_every_scale() {
        let left = EyeBitmap::new(RgbaImage::from_pixel(37, 19, Rgba([255, 255, 255, 255])));
        let right = EyeBitmap::new(RgbaImage::from_pixel(300, 120, Rgba([0, 0, 0, 255])));

        let tensors = build_eye_tensors(&left, &right).unwrap();
        for crop in tensors.left.by_scale() {
            assert_eq!(crop.as_slice().len(), crop.scale().len());
            assert!(crop.as_slice().iter().all(|&v| (v - 1.0).abs() < 1e-6));
        }
        for crop in tensors.right.by_scale() {
            assert!(crop.as_slice().iter().all(|&v| v == 0.0));
        }
    }

    #[test]
    fn test_crop_is_row_major() {
        // Top row white, bottom rows black, already at the low scale size.
        let image = RgbaImage::from_fn(160, 60, |_, y| {
            if y == 0 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([0, 0, 0, 255])
            }
        });
        let crop = crop_at_scale(&EyeBitmap::new(image), Scale::Low).unwrap();
        assert!(crop.as_slice()[..160].iter().all(|&v| v == 1.0));
        assert!(crop.as_slice()[160..].iter().all(|&v| v == 0.0));
    }
}
