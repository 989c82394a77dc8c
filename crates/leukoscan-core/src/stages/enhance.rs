//! Iris crop enhancement: unsharp mask, then resize to the classifier input.

// Kernel sizes and channel math stay well inside f32 precision.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]

use image::imageops::{self, FilterType};
use image::RgbImage;
use imageproc::filter::gaussian_blur_f32;

use crate::domain::{EnhanceError, EnhancedCrop};

/// Side length of the classifier input.
pub const CANONICAL_SIZE: u32 = 224;

/// Unsharp mask and resize parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnhanceConfig {
    /// Gaussian kernel size in pixels.
    pub radius: u32,
    /// Weight of the detail layer added back.
    pub strength: f32,
    /// Output side length.
    pub output_size: u32,
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            radius: 5,
            strength: 0.5,
            output_size: CANONICAL_SIZE,
        }
    }
}

/// Gaussian sigma for a kernel of size `k` when none is given explicitly.
#[must_use]
pub fn sigma_for_kernel(k: u32) -> f32 {
    (0.3 * ((k as f32 - 1.0) * 0.5 - 1.0) + 0.8).max(0.1)
}

/// Sharpens and resizes an iris crop.
///
/// Output depends only on the input pixels and `config`.
///
/// # Errors
///
/// Returns [`EnhanceError`] if the crop is empty or the output size is zero.
pub fn enhance(crop: &RgbImage, config: &EnhanceConfig) -> Result<EnhancedCrop, EnhanceError> {
    let (width, height) = crop.dimensions();
    if width == 0 || height == 0 {
        return Err(EnhanceError::EmptyInput { width, height });
    }
    if config.output_size == 0 {
        return Err(EnhanceError::InvalidOutputSize(config.output_size));
    }

    let sharpened = unsharp_mask(crop, config.radius, config.strength);
    let image = imageops::resize(
        &sharpened,
        config.output_size,
        config.output_size,
        FilterType::Triangle,
    );
    Ok(EnhancedCrop { image })
}

/// `clamp(orig * (1 + strength) - blurred * strength)`, rounded to nearest.
#[must_use]
pub fn unsharp_mask(image: &RgbImage, radius: u32, strength: f32) -> RgbImage {
    if radius == 0 || strength.abs() < f32::EPSILON {
        return image.clone();
    }

    let blurred = gaussian_blur_f32(image, sigma_for_kernel(radius));
    let mut out = image.clone();
    for (dst, blur) in out.pixels_mut().zip(blurred.pixels()) {
        for (channel, &b) in dst.0.iter_mut().zip(blur.0.iter()) {
            let value = f32::from(*channel) * (1.0 + strength) - f32::from(b) * strength;
            *channel = value.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}
