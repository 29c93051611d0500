//! Synthetic eyes, frames and model files for testing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use eyestate_core::domain::{
    write_yuv420, yuv420_len, BufferPool, CaptureDevice, EyeBitmap, EyeBundle, EyePair, Frame,
    LensFacing, PixelFormat, Size,
};
use eyestate_core::inference::{parameter_shapes, DEFAULT_NUM_CLASSES};
use image::{Rgba, RgbaImage};
use safetensors::tensor::TensorView;

/// Builders for eye bitmaps, bundles and frames.
pub struct SyntheticEyes;

impl SyntheticEyes {
    /// A flat gray eye crop.
    #[must_use]
    pub fn flat(width: u32, height: u32, value: u8) -> EyeBitmap {
        EyeBitmap::new(RgbaImage::from_pixel(
            width,
            height,
            Rgba([value, value, value, 255]),
        ))
    }

    /// A dark pupil on a light background, roughly an open eye.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn open_eye(width: u32, height: u32) -> EyeBitmap {
        let (cx, cy) = (width as i64 / 2, height as i64 / 2);
        let r = i64::from(height.min(width)) / 3;
        EyeBitmap::new(RgbaImage::from_fn(width, height, |x, y| {
            let (dx, dy) = (i64::from(x) - cx, i64::from(y) - cy);
            if dx * dx + dy * dy <= r * r {
                Rgba([20, 20, 20, 255])
            } else {
                Rgba([230, 220, 210, 255])
            }
        }))
    }

    /// A pair of identical flat crops.
    #[must_use]
    pub fn pair(value: u8) -> EyePair {
        let eye = Self::flat(48, 24, value);
        EyePair {
            left: eye.clone(),
            right: eye,
        }
    }

    /// A bundle of `n` pairs with increasing brightness.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn bundle(n: usize) -> EyeBundle {
        EyeBundle::from_pairs((0..n).map(|i| Self::pair((i * 40 % 256) as u8)).collect())
    }

    /// A YUV frame of `size` filled with `color`.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn frame(size: Size, color: [u8; 3]) -> Frame {
        let image = RgbaImage::from_pixel(
            size.width,
            size.height,
            Rgba([color[0], color[1], color[2], 255]),
        );
        let pool = BufferPool::new(1, yuv420_len(size));
        let mut buffer = pool.try_acquire().expect("fresh pool has a buffer");
        assert!(write_yuv420(&image, &mut buffer));
        Frame::new(size, Duration::ZERO, buffer).expect("buffer sized for frame")
    }

    /// Writes `left_0..n` and `right_0..n` PNG files into `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be written.
    pub fn write_bundle_dir(dir: &Path, n: usize) -> Result<()> {
        for i in 0..n {
            Self::open_eye(64, 32)
                .image()
                .save(dir.join(format!("left_{i}.png")))
                .with_context(|| format!("Failed to write left_{i}.png"))?;
            Self::open_eye(64, 32)
                .image()
                .save(dir.join(format!("right_{i}.png")))
                .with_context(|| format!("Failed to write right_{i}.png"))?;
        }
        Ok(())
    }
}

/// Capture devices shaped like a typical phone.
pub struct DeviceBuilder;

impl DeviceBuilder {
    /// Back camera `"0"` and front camera `"1"` with common sizes.
    #[must_use]
    pub fn phone() -> Vec<CaptureDevice> {
        let sizes = vec![
            Size::new(1920, 1080),
            Size::new(1280, 720),
            Size::new(640, 480),
            Size::new(720, 720),
            Size::new(320, 240),
        ];
        vec![
            CaptureDevice::new("0", LensFacing::Back)
                .with_format(PixelFormat::Yuv420, sizes.clone())
                .with_display_sizes(sizes.clone()),
            CaptureDevice::new("1", LensFacing::Front)
                .with_format(PixelFormat::Yuv420, sizes.clone())
                .with_format(PixelFormat::Jpeg, sizes.clone())
                .with_display_sizes(sizes),
        ]
    }
}

/// An all-zero network written to disk.
pub struct ZeroModel {
    /// Weights file.
    pub model: PathBuf,
    /// Labels file.
    pub labels: PathBuf,
}

impl ZeroModel {
    /// Writes `eye_state.safetensors` and `labels.txt` with the default class count.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be written.
    pub fn write(dir: &Path) -> Result<Self> {
        Self::write_with_classes(dir, DEFAULT_NUM_CLASSES)
    }

    /// Writes a zero network for `num_classes` classes.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or a write fails.
    pub fn write_with_classes(dir: &Path, num_classes: usize) -> Result<Self> {
        let shapes = parameter_shapes(num_classes);
        let buffers: Vec<Vec<f32>> = shapes
            .iter()
            .map(|(_, shape)| vec![0.0f32; shape.iter().product()])
            .collect();

        let mut views = HashMap::new();
        for ((name, shape), data) in shapes.iter().zip(&buffers) {
            let view = TensorView::new(
                safetensors::Dtype::F32,
                shape.clone(),
                bytemuck::cast_slice(data),
            )
            .with_context(|| format!("Invalid tensor {name}"))?;
            views.insert(name.clone(), view);
        }
        let bytes = safetensors::serialize(views, &None).context("Failed to serialize weights")?;

        let model = dir.join("eye_state.safetensors");
        std::fs::write(&model, bytes).context("Failed to write weights")?;

        let labels = dir.join("labels.txt");
        let text: Vec<String> = (0..num_classes).map(|i| format!("state_{i}")).collect();
        std::fs::write(&labels, text.join("\n")).context("Failed to write labels")?;

        Ok(Self { model, labels })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_size() {
        assert_eq!(SyntheticEyes::bundle(5).len(), 5);
    }

    #[test]
    fn test_frame_has_requested_size() {
        let frame = SyntheticEyes::frame(Size::new(8, 6), [255, 0, 0]);
        assert_eq!(frame.size(), Size::new(8, 6));
        assert_eq!(frame.y_plane().len(), 48);
    }

    #[test]
    fn test_zero_model_files_exist() {
        let dir = tempfile::tempdir().unwrap();
        let model = ZeroModel::write(dir.path()).unwrap();
        assert!(model.model.exists());
        assert_eq!(
            std::fs::read_to_string(&model.labels).unwrap().lines().count(),
            7
        );
    }
}
