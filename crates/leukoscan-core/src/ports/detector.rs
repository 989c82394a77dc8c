//! Detector capability port.

use image::DynamicImage;

use crate::domain::DetectionBox;

/// Port for an object detector (face, eye or iris).
///
/// Boxes are returned in the pixel space of `image`, in the order the
/// detector reported them. Implementations perform blocking I/O and must
/// bound it with a timeout.
pub trait Detector: Send + Sync {
    /// Short identifier used in logs (model id, mock name).
    fn name(&self) -> &str;

    /// Runs detection on `image`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing service is unreachable, times out or
    /// answers with something that is not a prediction list.
    fn infer(&self, image: &DynamicImage) -> anyhow::Result<Vec<DetectionBox>>;
}
