//! Filesystem adapter for loading eye bundles.
//!
//! A bundle directory holds `left_0` .. `left_4` and `right_0` .. `right_4`
//! image files in any supported raster format.

use anyhow::{Context, Result};
use eyestate_core::domain::{EyeBitmap, EyeBundle, BATCH_SIZE};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Supported image extensions.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Loads eye bundles from directories on disk.
pub struct FsEyeBundleSource {
    dir: PathBuf,
    pairs: usize,
}

impl FsEyeBundleSource {
    /// Creates a source reading a full batch from `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            pairs: BATCH_SIZE,
        }
    }

    /// Overrides how many pairs are read.
    #[must_use]
    pub const fn with_pairs(mut self, pairs: usize) -> Self {
        self.pairs = pairs;
        self
    }

    /// Directory being read.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Loads every `left_i` / `right_i` pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory is missing, a file for some index
    /// is absent, or an image fails to decode.
    pub fn load(&self) -> Result<EyeBundle> {
        if !self.dir.is_dir() {
            anyhow::bail!("Not a directory: {}", self.dir.display());
        }

        let mut left = Vec::with_capacity(self.pairs);
        let mut right = Vec::with_capacity(self.pairs);
        for i in 0..self.pairs {
            left.push(self.load_eye("left", i)?);
            right.push(self.load_eye("right", i)?);
        }

        debug!("Loaded {} eye pairs from {}", self.pairs, self.dir.display());
        Ok(EyeBundle::from_lists(left, right))
    }

    fn load_eye(&self, side: &str, index: usize) -> Result<EyeBitmap> {
        let stem = format!("{side}_{index}");
        let path = find_image(&self.dir, &stem)
            .with_context(|| format!("Missing {stem} in {}", self.dir.display()))?;
        load_bitmap(&path)
    }
}

/// Finds `<stem>.<ext>` for the first supported extension present.
fn find_image(dir: &Path, stem: &str) -> Option<PathBuf> {
    let mut found = IMAGE_EXTENSIONS
        .iter()
        .flat_map(|ext| [ext.to_string(), ext.to_uppercase()])
        .map(|ext| dir.join(format!("{stem}.{ext}")))
        .filter(|p| p.is_file());
    let first = found.next();
    if let (Some(chosen), Some(other)) = (&first, found.next()) {
        warn!(
            "Both {} and {} exist, using the first",
            chosen.display(),
            other.display()
        );
    }
    first
}

/// Loads an image file as an RGBA bitmap.
pub fn load_bitmap(path: &Path) -> Result<EyeBitmap> {
    let image =
        image::open(path).with_context(|| format!("Failed to open image: {}", path.display()))?;
    Ok(EyeBitmap::new(image.to_rgba8()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn write(dir: &Path, name: &str) {
        RgbaImage::from_pixel(4, 2, Rgba([1, 2, 3, 255]))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn test_find_image_prefers_known_extension() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "left_0.png");
        std::fs::write(dir.path().join("left_0.txt"), "x").unwrap();

        let found = find_image(dir.path(), "left_0").unwrap();
        assert!(found.ends_with("left_0.png"));
        assert!(find_image(dir.path(), "right_0").is_none());
    }

    #[test]
    fn test_load_reports_missing_index() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "left_0.png");
        write(dir.path(), "right_0.png");

        let err = FsEyeBundleSource::new(dir.path()).load().unwrap_err();
        assert!(format!("{err:#}").contains("left_1"));

        let bundle = FsEyeBundleSource::new(dir.path())
            .with_pairs(1)
            .load()
            .unwrap();
        assert_eq!(bundle.len(), 1);
    }

    #[test]
    fn test_missing_dir() {
        assert!(FsEyeBundleSource::new("/nonexistent/eyes").load().is_err());
    }
}
