//! Error taxonomy for a screening run.
//!
//! Gate outcomes (no face, wrong eye count, no iris) are not errors; they are
//! carried by [`PipelineResult`](super::PipelineResult). Only failures that
//! prevent producing a trustworthy answer end up here.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Boxed error coming back from a capability adapter.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The external capability a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Face detector behind the face gate.
    FaceDetector,
    /// Eye detector.
    EyeDetector,
    /// Iris detector.
    IrisDetector,
    /// Leukocoria classifier.
    Classifier,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FaceDetector => write!(f, "face detector"),
            Self::EyeDetector => write!(f, "eye detector"),
            Self::IrisDetector => write!(f, "iris detector"),
            Self::Classifier => write!(f, "leukocoria classifier"),
        }
    }
}

/// Failure to turn uploaded bytes into pixels.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// No bytes were supplied.
    #[error("image payload is empty")]
    Empty,

    /// The bytes are not a supported encoded image.
    #[error("image could not be decoded")]
    Malformed(#[source] image::ImageError),

    /// The image decoded but has no pixels.
    #[error("image decoded to zero dimensions ({width}x{height})")]
    ZeroDimensions {
        /// Decoded width.
        width: u32,
        /// Decoded height.
        height: u32,
    },

    /// The image file could not be read.
    #[error("failed to read image file {path}")]
    Io {
        /// Offending path.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Precondition failures of the enhancer.
#[derive(Debug, Error)]
pub enum EnhanceError {
    /// The iris crop has no pixels.
    #[error("cannot enhance an empty crop ({width}x{height})")]
    EmptyInput {
        /// Crop width.
        width: u32,
        /// Crop height.
        height: u32,
    },

    /// The requested output size has no pixels.
    #[error("output size must be positive, got {0}")]
    InvalidOutputSize(u32),
}

/// Errors that abort a screening run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing or undecodable image; the caller can fix this.
    #[error("invalid input image")]
    Input(#[from] DecodeError),

    /// A detector could not be reached or returned garbage.
    #[error("{capability} unavailable after {attempts} attempt(s)")]
    UpstreamUnavailable {
        /// Which detector failed.
        capability: Capability,
        /// Attempts made, including the retry.
        attempts: u32,
        /// Last error reported by the adapter.
        #[source]
        source: BoxError,
    },

    /// The classifier backend could not be reached or loaded.
    #[error("leukocoria classifier unavailable after {attempts} attempt(s)")]
    ClassificationUnavailable {
        /// Attempts made, including the retry.
        attempts: u32,
        /// Last error reported by the backend.
        #[source]
        source: BoxError,
    },

    /// The caller gave up on the request.
    #[error("screening request cancelled")]
    Cancelled,

    /// Internal invariant broken while enhancing a crop.
    #[error("iris enhancement failed")]
    Enhancement(#[from] EnhanceError),
}

impl PipelineError {
    /// Builds the error for a capability that kept failing.
    #[must_use]
    pub fn unavailable(capability: Capability, attempts: u32, source: anyhow::Error) -> Self {
        let source: BoxError = source.into();
        match capability {
            Capability::Classifier => Self::ClassificationUnavailable { attempts, source },
            Capability::FaceDetector | Capability::EyeDetector | Capability::IrisDetector => {
                Self::UpstreamUnavailable {
                    capability,
                    attempts,
                    source,
                }
            }
        }
    }

    /// Stable machine-readable code for responses and logs.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Input(_) => "invalid_input",
            Self::UpstreamUnavailable { .. } => "upstream_unavailable",
            Self::ClassificationUnavailable { .. } => "classification_unavailable",
            Self::Cancelled => "cancelled",
            Self::Enhancement(_) => "internal",
        }
    }

    /// HTTP-equivalent status for this failure.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::Input(_) => 400,
            Self::UpstreamUnavailable { .. } | Self::ClassificationUnavailable { .. } => 503,
            Self::Cancelled => 499,
            Self::Enhancement(_) => 500,
        }
    }
}
