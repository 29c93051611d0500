//! Eye bitmaps, bundles of eye pairs and the multi-scale crops fed to the network.

use std::sync::Arc;

use image::RgbaImage;
use serde::Serialize;

use crate::error::InferenceError;

/// Resolution level of an eye crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scale {
    /// 160×60.
    Low,
    /// 200×80.
    Mid,
    /// 240×100.
    High,
}

/// All scales, lowest first.
pub const SCALES: [Scale; 3] = [Scale::Low, Scale::Mid, Scale::High];

impl Scale {
    /// Crop width in pixels.
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Self::Low => 160,
            Self::Mid => 200,
            Self::High => 240,
        }
    }

    /// Crop height in pixels.
    #[must_use]
    pub const fn height(self) -> usize {
        match self {
            Self::Low => 60,
            Self::Mid => 80,
            Self::High => 100,
        }
    }

    /// Number of values in a crop of this scale.
    #[must_use]
    pub const fn len(self) -> usize {
        self.width() * self.height()
    }

    /// Short name used for parameter prefixes and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Mid => "mid",
            Self::High => "high",
        }
    }
}

/// Which eye a crop or score belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Eye {
    /// Subject's left eye.
    Left,
    /// Subject's right eye.
    Right,
}

impl Eye {
    /// Parameter prefix for this eye's branch.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

/// A cropped eye image. Cheap to clone.
#[derive(Debug, Clone, PartialEq)]
pub struct EyeBitmap(Arc<RgbaImage>);

impl EyeBitmap {
    /// Wraps a decoded image.
    #[must_use]
    pub fn new(image: RgbaImage) -> Self {
        Self(Arc::new(image))
    }

    /// Underlying pixels.
    #[must_use]
    pub fn image(&self) -> &RgbaImage {
        &self.0
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.0.width()
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.0.height()
    }
}

impl From<RgbaImage> for EyeBitmap {
    fn from(image: RgbaImage) -> Self {
        Self::new(image)
    }
}

/// Left and right eye crops taken from the same frame.
#[derive(Debug, Clone, PartialEq)]
pub struct EyePair {
    /// Subject's left eye.
    pub left: EyeBitmap,
    /// Subject's right eye.
    pub right: EyeBitmap,
}

/// Ordered eye pairs handed from capture to verification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EyeBundle {
    pairs: Vec<EyePair>,
}

impl EyeBundle {
    /// Builds a bundle from already paired crops.
    #[must_use]
    pub fn from_pairs(pairs: Vec<EyePair>) -> Self {
        Self { pairs }
    }

    /// Zips separate left and right lists. Extra entries in the longer list are dropped.
    #[must_use]
    pub fn from_lists(left: Vec<EyeBitmap>, right: Vec<EyeBitmap>) -> Self {
        let pairs = left
            .into_iter()
            .zip(right)
            .map(|(left, right)| EyePair { left, right })
            .collect();
        Self { pairs }
    }

    /// Number of pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// True if the bundle holds no pairs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Pair at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&EyePair> {
        self.pairs.get(index)
    }

    /// Pairs in capture order.
    pub fn pairs(&self) -> impl Iterator<Item = &EyePair> {
        self.pairs.iter()
    }

    /// Left eyes in capture order.
    pub fn left(&self) -> impl Iterator<Item = &EyeBitmap> {
        self.pairs.iter().map(|p| &p.left)
    }

    /// Right eyes in capture order.
    pub fn right(&self) -> impl Iterator<Item = &EyeBitmap> {
        self.pairs.iter().map(|p| &p.right)
    }
}

/// Normalized grayscale values for one eye at one scale, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct EyeCrop {
    scale: Scale,
    data: Vec<f32>,
}

impl EyeCrop {
    /// Wraps `data`, checking it matches the scale's shape.
    pub fn new(scale: Scale, data: Vec<f32>) -> Result<Self, InferenceError> {
        if data.len() != scale.len() {
            return Err(InferenceError::ShapeMismatch {
                scale,
                expected: scale.len(),
                actual: data.len(),
            });
        }
        Ok(Self { scale, data })
    }

    /// An all-black crop.
    #[must_use]
    pub fn zeros(scale: Scale) -> Self {
        Self {
            scale,
            data: vec![0.0; scale.len()],
        }
    }

    /// Scale of this crop.
    #[must_use]
    pub const fn scale(&self) -> Scale {
        self.scale
    }

    /// Values in `[0, 1]`.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// One eye's crops at every scale.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiScaleCrop {
    /// Low resolution crop.
    pub low: EyeCrop,
    /// Mid resolution crop.
    pub mid: EyeCrop,
    /// High resolution crop.
    pub high: EyeCrop,
}

impl MultiScaleCrop {
    /// Checks that each crop sits at its own scale.
    pub fn new(low: EyeCrop, mid: EyeCrop, high: EyeCrop) -> Result<Self, InferenceError> {
        for (crop, scale) in [(&low, Scale::Low), (&mid, Scale::Mid), (&high, Scale::High)] {
            if crop.scale != scale {
                return Err(InferenceError::ShapeMismatch {
                    scale,
                    expected: scale.len(),
                    actual: crop.data.len(),
                });
            }
        }
        Ok(Self { low, mid, high })
    }

    /// All-black crops at every scale.
    #[must_use]
    pub fn zeros() -> Self {
        Self {
            low: EyeCrop::zeros(Scale::Low),
            mid: EyeCrop::zeros(Scale::Mid),
            high: EyeCrop::zeros(Scale::High),
        }
    }

    /// Crops lowest scale first.
    #[must_use]
    pub const fn by_scale(&self) -> [&EyeCrop; 3] {
        [&self.low, &self.mid, &self.high]
    }
}

/// The six network inputs: three scales for each eye.
#[derive(Debug, Clone, PartialEq)]
pub struct EyeTensors {
    /// Right eye crops.
    pub right: MultiScaleCrop,
    /// Left eye crops.
    pub left: MultiScaleCrop,
}

impl EyeTensors {
    /// Builds the inputs in network feed order.
    pub fn new(
        low_right: EyeCrop,
        mid_right: EyeCrop,
        high_right: EyeCrop,
        low_left: EyeCrop,
        mid_left: EyeCrop,
        high_left: EyeCrop,
    ) -> Result<Self, InferenceError> {
        Ok(Self {
            right: MultiScaleCrop::new(low_right, mid_right, high_right)?,
            left: MultiScaleCrop::new(low_left, mid_left, high_left)?,
        })
    }

    /// All-zero inputs.
    #[must_use]
    pub fn zeros() -> Self {
        Self {
            right: MultiScaleCrop::zeros(),
            left: MultiScaleCrop::zeros(),
        }
    }

    /// Crops for one eye.
    #[must_use]
    pub const fn eye(&self, eye: Eye) -> &MultiScaleCrop {
        match eye {
            Eye::Left => &self.left,
            Eye::Right => &self.right,
        }
    }
}
