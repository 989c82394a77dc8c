//! Classification of an enhanced iris crop.

use tracing::debug;

use crate::domain::{Capability, ClassificationResult, EnhancedCrop, EyeSide, PipelineError};
use crate::ports::LeukocoriaClassifier;
use crate::retry::Caller;

/// Classifies one enhanced crop.
///
/// Probabilities outside `[0, 1]` are clamped; NaN counts as a backend
/// failure and goes through the retry policy like any other error.
///
/// # Errors
///
/// Returns [`PipelineError::ClassificationUnavailable`] if the backend fails.
pub fn classify(
    classifier: &dyn LeukocoriaClassifier,
    side: EyeSide,
    crop: &EnhancedCrop,
    caller: &Caller<'_>,
) -> Result<ClassificationResult, PipelineError> {
    let probability = caller.call(Capability::Classifier, || {
        let p = classifier.classify(&crop.image)?;
        if p.is_nan() {
            anyhow::bail!("{} returned NaN", classifier.name());
        }
        Ok(p.clamp(0.0, 1.0))
    })?;

    let result = ClassificationResult::from_probability(probability);
    debug!(
        "{} classified {side} eye: p={probability:.4} leukocoria={}",
        classifier.name(),
        result.has_leukocoria
    );
    Ok(result)
}
