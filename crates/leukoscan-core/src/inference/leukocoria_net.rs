//! In-process leukocoria classifier.
//!
//! A small CNN over the enhanced 224x224 RGB iris crop. Weights come from a
//! safetensors file and are loaded on first use.

// Allow common ML code patterns
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

use std::path::Path;

use anyhow::{Context, Result};
use candle_core::{Device, Module, Tensor};
use candle_nn::{conv2d, linear, Conv2d, Conv2dConfig, Linear, VarBuilder};
use image::imageops::FilterType;
use image::RgbImage;
use tracing::debug;

use super::{select_device, sigmoid, LazyModel};
use crate::ports::LeukocoriaClassifier;
use crate::stages::CANONICAL_SIZE;

const INPUT_SIZE: usize = CANONICAL_SIZE as usize;

/// Leukocoria CNN.
///
/// Architecture: 3 conv+ReLU+maxpool blocks (3 -> 16 -> 32 -> 64 channels),
/// global average pooling, then 2 FC layers.
/// Input: `(1, 3, 224, 224)` RGB in `[0, 1]`
/// Output: logit of the leukocoria class
pub struct LeukocoriaNet {
    conv1: Conv2d,
    conv2: Conv2d,
    conv3: Conv2d,
    fc1: Linear,
    fc2: Linear,
    device: Device,
}

impl LeukocoriaNet {
    /// Builds the network from weights.
    ///
    /// # Errors
    ///
    /// Returns an error if a tensor is missing or has the wrong shape.
    #[allow(clippy::needless_pass_by_value)]
    pub fn new(vb: VarBuilder) -> Result<Self> {
        let device = vb.device().clone();
        let same = Conv2dConfig {
            padding: 1,
            ..Conv2dConfig::default()
        };

        let conv1 = conv2d(3, 16, 3, same, vb.pp("conv1"))?;
        let conv2 = conv2d(16, 32, 3, same, vb.pp("conv2"))?;
        let conv3 = conv2d(32, 64, 3, same, vb.pp("conv3"))?;

        // Global average pooling leaves one value per channel.
        let fc1 = linear(64, 32, vb.pp("fc1"))?;
        let fc2 = linear(32, 1, vb.pp("fc2"))?;

        Ok(Self {
            conv1,
            conv2,
            conv3,
            fc1,
            fc2,
            device,
        })
    }

    /// Converts a crop to a `(1, 3, 224, 224)` tensor in `[0, 1]`.
    ///
    /// Crops of any other size are resized first.
    ///
    /// # Errors
    ///
    /// Returns an error if tensor creation fails.
    pub fn preprocess(&self, crop: &RgbImage) -> Result<Tensor> {
        let resized;
        let crop = if crop.dimensions() == (CANONICAL_SIZE, CANONICAL_SIZE) {
            crop
        } else {
            resized = image::imageops::resize(
                crop,
                CANONICAL_SIZE,
                CANONICAL_SIZE,
                FilterType::Triangle,
            );
            &resized
        };

        let data: Vec<f32> = crop.as_raw().iter().map(|&v| f32::from(v) / 255.0).collect();

        Tensor::from_vec(data, (INPUT_SIZE, INPUT_SIZE, 3), &self.device)?
            .permute((2, 0, 1))?
            .unsqueeze(0)?
            .contiguous()
            .context("Failed to create iris tensor")
    }

    /// Probability that the crop shows leukocoria.
    ///
    /// # Errors
    ///
    /// Returns an error if preprocessing or inference fails.
    pub fn probability(&self, crop: &RgbImage) -> Result<f32> {
        let input = self.preprocess(crop)?;
        let logit = self
            .forward(&input)?
            .squeeze(0)?
            .squeeze(0)?
            .to_scalar::<f32>()?;
        Ok(sigmoid(logit))
    }
}

impl Module for LeukocoriaNet {
    fn forward(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        let x = self.conv1.forward(x)?.relu()?.max_pool2d(2)?;
        let x = self.conv2.forward(&x)?.relu()?.max_pool2d(2)?;
        let x = self.conv3.forward(&x)?.relu()?.max_pool2d(2)?;

        // (1, 64, 28, 28) -> (1, 64)
        let x = x.mean(3)?.mean(2)?;

        let x = self.fc1.forward(&x)?.relu()?;
        self.fc2.forward(&x)
    }
}

/// [`LeukocoriaClassifier`] backed by [`LeukocoriaNet`] running in-process.
///
/// The weights load on the first `classify` call. A failed load is not
/// remembered, so a later call retries once the file is in place.
pub struct LocalClassifier {
    model: LazyModel<LeukocoriaNet>,
}

impl LocalClassifier {
    /// Creates a classifier for the weights at `path` on the best device.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::with_device(path, select_device())
    }

    /// Creates a classifier on an explicit device.
    #[must_use]
    pub fn with_device(path: impl AsRef<Path>, device: Device) -> Self {
        Self {
            model: LazyModel::new(path, device, LeukocoriaNet::new),
        }
    }

    /// True once the weights are in memory.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.model.is_loaded()
    }
}

impl LeukocoriaClassifier for LocalClassifier {
    fn name(&self) -> &'static str {
        "local"
    }

    fn classify(&self, crop: &RgbImage) -> Result<f32> {
        let model = self
            .model
            .get()
            .context("Leukocoria model could not be loaded")?;
        let p = model.probability(crop)?;
        debug!("Local classifier probability {p:.4}");
        Ok(p)
    }
}
