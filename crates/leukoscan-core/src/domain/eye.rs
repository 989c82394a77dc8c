//! Per-eye types produced while a screening runs.

use std::fmt;

use image::{DynamicImage, RgbImage};
use serde::{Deserialize, Serialize};

use super::{DetectionBox, PixelRect};

/// Probability above which a crop is flagged as leukocoria.
pub const DECISION_THRESHOLD: f32 = 0.5;

/// Image-space side of an eye.
///
/// `Left` is the eye with the smaller x coordinate in the photograph. For a
/// subject facing the camera that is the subject's right eye, and mirrored
/// (selfie) captures flip it again. No anatomical correction is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EyeSide {
    /// Smaller image x.
    Left,
    /// Larger image x.
    Right,
}

impl EyeSide {
    /// Both sides in output order.
    pub const BOTH: [Self; 2] = [Self::Left, Self::Right];

    /// Lowercase label used in file names and JSON.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

impl fmt::Display for EyeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An eye region cut from the original image.
#[derive(Debug, Clone)]
pub struct EyeCrop {
    /// Assigned side.
    pub side: EyeSide,
    /// Eye detection rescaled to original-image coordinates (before widening).
    pub source_box: DetectionBox,
    /// Widened, clipped crop bounds in the original image.
    pub bounds: PixelRect,
    /// Cropped pixels.
    pub image: DynamicImage,
}

/// The iris chosen for one eye, in eye-crop coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IrisPrediction {
    /// Selected detection.
    pub detection: DetectionBox,
    /// Detection clipped to the eye crop.
    pub bounds: PixelRect,
}

/// Canonical-size, sharpened iris crop ready for classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnhancedCrop {
    /// RGB pixels, `CANONICAL_SIZE` square.
    pub image: RgbImage,
}

impl EnhancedCrop {
    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Binary classifier verdict for one eye.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// `score > DECISION_THRESHOLD`.
    pub has_leukocoria: bool,
    /// Classifier probability (0.0 to 1.0).
    pub score: f32,
}

impl ClassificationResult {
    /// Applies the strict decision threshold to a probability.
    #[must_use]
    pub fn from_probability(probability: f32) -> Self {
        Self {
            has_leukocoria: probability > DECISION_THRESHOLD,
            score: probability,
        }
    }
}

/// Everything the pipeline produced for one eye.
#[derive(Debug, Clone)]
pub struct EyeReport {
    /// The eye crop.
    pub crop: EyeCrop,
    /// Selected iris, `None` when the detector found none.
    pub iris: Option<IrisPrediction>,
    /// Enhanced iris crop, present whenever `iris` is.
    pub enhanced: Option<EnhancedCrop>,
    /// Verdict, `None` (indeterminate) when no iris was found.
    pub classification: Option<ClassificationResult>,
}

impl EyeReport {
    /// The side this report belongs to.
    #[must_use]
    pub const fn side(&self) -> EyeSide {
        self.crop.side
    }

    /// Leukocoria flag, `None` when indeterminate.
    #[must_use]
    pub fn flag(&self) -> Option<bool> {
        self.classification.map(|c| c.has_leukocoria)
    }
}
