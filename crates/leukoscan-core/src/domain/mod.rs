//! Core domain types for leukocoria screening.

mod detection;
mod error;
mod eye;
mod result;

pub use detection::{DetectionBox, PixelRect};
pub use error::{BoxError, Capability, DecodeError, EnhanceError, PipelineError};
pub use eye::{
    ClassificationResult, EnhancedCrop, EyeCrop, EyeReport, EyeSide, IrisPrediction,
    DECISION_THRESHOLD,
};
pub use result::{
    EyePair, Outcome, PipelineResult, NO_FACE_WARNING, WRONG_EYE_COUNT_WARNING,
};
