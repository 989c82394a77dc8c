//! Leukocoria classifier capability port.

use image::RgbImage;

/// Port for the binary leukocoria classifier.
///
/// Callers see one contract whether the model runs in-process or behind a
/// remote service; which backend is used is a configuration concern.
pub trait LeukocoriaClassifier: Send + Sync {
    /// Backend name used in logs.
    fn name(&self) -> &'static str;

    /// Returns the probability (0.0 to 1.0) that `crop` shows leukocoria.
    ///
    /// `crop` is the canonical-size enhanced iris crop.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be loaded or reached.
    fn classify(&self, crop: &RgbImage) -> anyhow::Result<f32>;
}
