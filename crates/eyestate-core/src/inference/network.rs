//! Multi-scale eye-state network.
//!
//! Each eye runs through one small convolutional branch per scale. Branch
//! features are pooled, concatenated and classified by a per-eye linear
//! head followed by softmax, giving two class distributions per sample.
//!
//! Parameters are named `{eye}.{scale}.conv{1,2}.{weight,bias}` and
//! `{eye}.head.{weight,bias}`.

use candle_core::{Device, Module, Tensor, D};
use candle_nn::{conv2d, linear, Conv2d, Conv2dConfig, Linear, VarBuilder};

use crate::domain::{Eye, EyeCrop, EyeTensors, MultiScaleCrop, Scale, SCALES};
use crate::error::InferenceError;

const CONV1_CHANNELS: usize = 8;
const CONV2_CHANNELS: usize = 16;
const KERNEL: usize = 3;

/// A scoring graph that maps six crops to two per-eye class distributions.
pub trait ScoringGraph: Send + Sync {
    /// Length of each output distribution.
    fn num_classes(&self) -> usize;

    /// Runs the forward pass. Returns `[right, left]` softmax vectors.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::Failure`] if execution fails.
    fn run(&self, inputs: &EyeTensors) -> Result<[Vec<f32>; 2], InferenceError>;
}

struct ScaleBranch {
    conv1: Conv2d,
    conv2: Conv2d,
}

impl ScaleBranch {
    fn new(vb: &VarBuilder) -> candle_core::Result<Self> {
        let config = Conv2dConfig {
            padding: 1,
            ..Conv2dConfig::default()
        };
        Ok(Self {
            conv1: conv2d(1, CONV1_CHANNELS, KERNEL, config, vb.pp("conv1"))?,
            conv2: conv2d(CONV1_CHANNELS, CONV2_CHANNELS, KERNEL, config, vb.pp("conv2"))?,
        })
    }
}

impl Module for ScaleBranch {
    fn forward(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        let h = self.conv1.forward(x)?.relu()?.max_pool2d(2)?;
        let h = self.conv2.forward(&h)?.relu()?;
        // Global average pool to (1, channels)
        h.mean((2, 3))
    }
}

struct EyeBranch {
    scales: [ScaleBranch; 3],
    head: Linear,
}

impl EyeBranch {
    fn new(vb: &VarBuilder, num_classes: usize) -> candle_core::Result<Self> {
        Ok(Self {
            scales: [
                ScaleBranch::new(&vb.pp(Scale::Low.as_str()))?,
                ScaleBranch::new(&vb.pp(Scale::Mid.as_str()))?,
                ScaleBranch::new(&vb.pp(Scale::High.as_str()))?,
            ],
            head: linear(CONV2_CHANNELS * SCALES.len(), num_classes, vb.pp("head"))?,
        })
    }

    fn forward(&self, crops: &MultiScaleCrop, device: &Device) -> candle_core::Result<Vec<f32>> {
        let mut features = Vec::with_capacity(SCALES.len());
        for (branch, crop) in self.scales.iter().zip(crops.by_scale()) {
            features.push(branch.forward(&crop_tensor(crop, device)?)?);
        }
        let features = Tensor::cat(&features, 1)?;
        let logits = self.head.forward(&features)?;
        candle_nn::ops::softmax(&logits, D::Minus1)?
            .squeeze(0)?
            .to_vec1::<f32>()
    }
}

fn crop_tensor(crop: &EyeCrop, device: &Device) -> candle_core::Result<Tensor> {
    let scale = crop.scale();
    Tensor::from_slice(crop.as_slice(), (1, 1, scale.height(), scale.width()), device)
}

/// The eye-state network: one [`EyeBranch`] per eye.
pub struct MultiScaleEyeNet {
    right: EyeBranch,
    left: EyeBranch,
    num_classes: usize,
    device: Device,
}

impl MultiScaleEyeNet {
    /// Builds the network from weights.
    ///
    /// # Errors
    ///
    /// Returns an error if a parameter is missing or has the wrong shape.
    #[allow(clippy::needless_pass_by_value)]
    pub fn new(vb: VarBuilder, num_classes: usize) -> candle_core::Result<Self> {
        let device = vb.device().clone();
        Ok(Self {
            right: EyeBranch::new(&vb.pp(Eye::Right.as_str()), num_classes)?,
            left: EyeBranch::new(&vb.pp(Eye::Left.as_str()), num_classes)?,
            num_classes,
            device,
        })
    }
}

impl ScoringGraph for MultiScaleEyeNet {
    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn run(&self, inputs: &EyeTensors) -> Result<[Vec<f32>; 2], InferenceError> {
        let right = self.right.forward(&inputs.right, &self.device)?;
        let left = self.left.forward(&inputs.left, &self.device)?;
        Ok([right, left])
    }
}

/// Name and shape of every network parameter, for writing weight files.
#[must_use]
pub fn parameter_shapes(num_classes: usize) -> Vec<(String, Vec<usize>)> {
    let mut shapes = Vec::new();
    for eye in [Eye::Right, Eye::Left] {
        for scale in SCALES {
            let prefix = format!("{}.{}", eye.as_str(), scale.as_str());
            shapes.push((
                format!("{prefix}.conv1.weight"),
                vec![CONV1_CHANNELS, 1, KERNEL, KERNEL],
            ));
            shapes.push((format!("{prefix}.conv1.bias"), vec![CONV1_CHANNELS]));
            shapes.push((
                format!("{prefix}.conv2.weight"),
                vec![CONV2_CHANNELS, CONV1_CHANNELS, KERNEL, KERNEL],
            ));
            shapes.push((format!("{prefix}.conv2.bias"), vec![CONV2_CHANNELS]));
        }
        let head = eye.as_str();
        shapes.push((
            format!("{head}.head.weight"),
            vec![num_classes, CONV2_CHANNELS * SCALES.len()],
        ));
        shapes.push((format!("{head}.head.bias"), vec![num_classes]));
    }
    shapes
}
