//! Iris localization inside an eye crop.

use image::{DynamicImage, GenericImageView};
use tracing::debug;

use crate::domain::{Capability, DetectionBox, EyeCrop, IrisPrediction, PipelineError};
use crate::geometry::clip_to_image;
use crate::ports::Detector;
use crate::retry::Caller;

/// Picks the prediction with the largest area; the first one wins ties.
#[must_use]
pub fn select_largest(predictions: &[DetectionBox]) -> Option<&DetectionBox> {
    predictions.iter().fold(None, |best, candidate| match best {
        Some(b) if candidate.area() <= b.area() => Some(b),
        _ => Some(candidate),
    })
}

/// Runs the iris detector on one eye crop.
///
/// `Ok(None)` means no usable iris was found, which is a normal outcome.
///
/// # Errors
///
/// Returns [`PipelineError::UpstreamUnavailable`] if the iris detector fails.
pub fn localize_iris(
    detector: &dyn Detector,
    crop: &EyeCrop,
    caller: &Caller<'_>,
) -> Result<Option<IrisPrediction>, PipelineError> {
    let predictions = caller.call(Capability::IrisDetector, || detector.infer(&crop.image))?;
    debug!(
        "{} reported {} iris candidate(s) for {} eye",
        detector.name(),
        predictions.len(),
        crop.side
    );

    let Some(best) = select_largest(&predictions) else {
        return Ok(None);
    };

    let (width, height) = crop.image.dimensions();
    let prediction = clip_to_image(best, width, height).map(|bounds| IrisPrediction {
        detection: *best,
        bounds,
    });
    if prediction.is_none() {
        debug!("Iris box for {} eye is empty after clipping", crop.side);
    }
    Ok(prediction)
}

/// Cuts the iris region out of its eye crop.
#[must_use]
pub fn crop_iris(crop: &EyeCrop, iris: &IrisPrediction) -> DynamicImage {
    let b = iris.bounds;
    crop.image.crop_imm(b.x1, b.y1, b.width(), b.height())
}
