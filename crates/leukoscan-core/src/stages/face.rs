//! Face presence gate.

use image::DynamicImage;
use tracing::debug;

use crate::domain::{Capability, PipelineError};
use crate::ports::Detector;
use crate::retry::Caller;

/// Result of the face gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceGate {
    /// At least one face; carries the detection count.
    Present(usize),
    /// No face; the pipeline stops with a warning.
    Absent,
}

/// Runs the face detector on the full-resolution image.
///
/// # Errors
///
/// A detector failure is reported as [`PipelineError::UpstreamUnavailable`]
/// and is never read as "no face".
pub fn check_face(
    detector: &dyn Detector,
    image: &DynamicImage,
    caller: &Caller<'_>,
) -> Result<FaceGate, PipelineError> {
    let faces = caller.call(Capability::FaceDetector, || detector.infer(image))?;
    debug!("{} reported {} face(s)", detector.name(), faces.len());

    Ok(if faces.is_empty() {
        FaceGate::Absent
    } else {
        FaceGate::Present(faces.len())
    })
}
