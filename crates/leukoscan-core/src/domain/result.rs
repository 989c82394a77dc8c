//! Pipeline result types.

use super::{EyeReport, EyeSide};

/// Warning attached when the face gate finds nobody.
pub const NO_FACE_WARNING: &str = "No face detected.";

/// Warning attached when the eye count after filtering is not two.
pub const WRONG_EYE_COUNT_WARNING: &str = "Exactly two eyes not detected.";

/// Left and right reports of an analyzed image.
#[derive(Debug, Clone)]
pub struct EyePair {
    /// Eye with the smaller image x.
    pub left: EyeReport,
    /// Eye with the larger image x.
    pub right: EyeReport,
}

impl EyePair {
    /// Returns the report for `side`.
    #[must_use]
    pub const fn get(&self, side: EyeSide) -> &EyeReport {
        match side {
            EyeSide::Left => &self.left,
            EyeSide::Right => &self.right,
        }
    }
}

/// How a screening run ended.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The face gate found no face; nothing else ran.
    NoFace,
    /// The eye localizer kept a number of eyes other than two.
    WrongEyeCount {
        /// Eyes left after thresholding and clipping.
        detected: usize,
    },
    /// Both eyes were processed.
    Analyzed(Box<EyePair>),
}

/// Result of one screening run.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// Terminal state.
    pub outcome: Outcome,
    /// Ordered, human-readable warnings.
    pub warnings: Vec<String>,
}

impl PipelineResult {
    pub(crate) fn no_face() -> Self {
        Self {
            outcome: Outcome::NoFace,
            warnings: vec![NO_FACE_WARNING.to_string()],
        }
    }

    pub(crate) fn wrong_eye_count(detected: usize) -> Self {
        Self {
            outcome: Outcome::WrongEyeCount { detected },
            warnings: vec![WRONG_EYE_COUNT_WARNING.to_string()],
        }
    }

    pub(crate) fn analyzed(left: EyeReport, right: EyeReport) -> Self {
        Self {
            outcome: Outcome::Analyzed(Box::new(EyePair { left, right })),
            warnings: Vec::new(),
        }
    }

    /// The per-eye reports, if the run got that far.
    #[must_use]
    pub fn eyes(&self) -> Option<&EyePair> {
        match &self.outcome {
            Outcome::Analyzed(pair) => Some(pair),
            Outcome::NoFace | Outcome::WrongEyeCount { .. } => None,
        }
    }

    /// Leukocoria flag for `side`; `None` for gate outcomes or indeterminate sides.
    #[must_use]
    pub fn flag(&self, side: EyeSide) -> Option<bool> {
        self.eyes().and_then(|pair| pair.get(side).flag())
    }

    /// True when at least one side was flagged.
    #[must_use]
    pub fn any_leukocoria(&self) -> bool {
        EyeSide::BOTH.iter().any(|&s| self.flag(s) == Some(true))
    }
}
