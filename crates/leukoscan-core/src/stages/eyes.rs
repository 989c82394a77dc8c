//! Eye localization.
//!
//! The eye detector degrades on very large uploads, so it runs on a copy
//! scaled down to at most `max_inference_dim` on the longest side. Surviving
//! boxes are mapped back so crops are cut from the full-resolution original.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use std::borrow::Cow;
use tracing::debug;

use crate::domain::{Capability, DetectionBox, PipelineError, PixelRect};
use crate::geometry::{clip_to_image, expand, inference_scale, scaled_dimensions, to_original};
use crate::ports::Detector;
use crate::retry::Caller;

/// Configuration for eye localization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeLocalizerConfig {
    /// Boxes below this confidence are dropped.
    pub confidence_threshold: f32,
    /// Longest side of the image handed to the detector.
    pub max_inference_dim: u32,
    /// Horizontal widening of each eye box.
    pub scale_w: f32,
    /// Vertical widening of each eye box.
    pub scale_h: f32,
}

impl Default for EyeLocalizerConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.75,
            max_inference_dim: 1024,
            scale_w: 2.0,
            scale_h: 5.0,
        }
    }
}

/// An eye box mapped into the original image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocatedEye {
    /// Detection rescaled to original coordinates, before widening.
    pub detection: DetectionBox,
    /// Widened crop, clipped to the image.
    pub bounds: PixelRect,
}

/// Result of eye localization.
#[derive(Debug, Clone, PartialEq)]
pub enum EyeLocalization {
    /// Exactly two eyes survived, in detector order.
    Pair(LocatedEye, LocatedEye),
    /// Any other count; the pipeline stops with a warning.
    WrongCount(usize),
}

/// Detects eyes and enforces the two-eye invariant.
///
/// # Errors
///
/// Returns [`PipelineError::UpstreamUnavailable`] if the eye detector fails.
pub fn localize_eyes(
    detector: &dyn Detector,
    image: &DynamicImage,
    config: &EyeLocalizerConfig,
    caller: &Caller<'_>,
) -> Result<EyeLocalization, PipelineError> {
    let (width, height) = image.dimensions();
    let scale = inference_scale(width, height, config.max_inference_dim);

    let inference_image = if scale < 1.0 {
        let (w, h) = scaled_dimensions(width, height, scale);
        debug!("Downscaling {width}x{height} to {w}x{h} for eye detection (s={scale:.4})");
        Cow::Owned(image.resize_exact(w, h, FilterType::Triangle))
    } else {
        Cow::Borrowed(image)
    };

    let raw = caller.call(Capability::EyeDetector, || {
        detector.infer(inference_image.as_ref())
    })?;
    debug!("{} reported {} eye candidate(s)", detector.name(), raw.len());

    let mut eyes = place_eyes(&raw, scale, width, height, config);
    if eyes.len() != 2 {
        debug!("Expected two eyes, kept {}", eyes.len());
        return Ok(EyeLocalization::WrongCount(eyes.len()));
    }

    let second = eyes.pop();
    let first = eyes.pop();
    match (first, second) {
        (Some(a), Some(b)) => Ok(EyeLocalization::Pair(a, b)),
        _ => Ok(EyeLocalization::WrongCount(0)),
    }
}

/// Thresholds, rescales, widens and clips raw detections.
///
/// Detections whose clipped crop would be empty are dropped.
#[must_use]
pub fn place_eyes(
    raw: &[DetectionBox],
    scale: f32,
    width: u32,
    height: u32,
    config: &EyeLocalizerConfig,
) -> Vec<LocatedEye> {
    raw.iter()
        .filter(|d| {
            let keep = d.confidence >= config.confidence_threshold;
            if !keep {
                debug!("Dropping eye candidate with confidence {:.2}", d.confidence);
            }
            keep
        })
        .filter_map(|d| {
            let detection = to_original(d, scale);
            let widened = expand(&detection, config.scale_w, config.scale_h);
            clip_to_image(&widened, width, height).map(|bounds| LocatedEye { detection, bounds })
        })
        .collect()
}
