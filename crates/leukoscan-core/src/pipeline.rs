//! Screening orchestrator.
//!
//! Sequences the stages for one image:
//!
//! ```text
//! Decoded -> FaceChecked -> EyesLocalized -> PerEye(left) | PerEye(right) -> Assembled
//! ```
//!
//! with early exits for "no face" and "wrong eye count". The two per-eye
//! sub-pipelines (iris, enhancement, classification) run on scoped threads
//! and are joined before assembly.

use std::sync::Arc;

use tracing::debug;

use crate::codec::{decode, DecodedImage};
use crate::domain::{EyeCrop, EyeReport, EyeSide, PipelineError, PipelineResult};
use crate::ports::{Detector, LeukocoriaClassifier};
use crate::retry::{CancellationToken, Caller, RetryPolicy};
use crate::stages::classify::classify;
use crate::stages::enhance::{enhance, EnhanceConfig};
use crate::stages::eyes::{localize_eyes, EyeLocalization, EyeLocalizerConfig};
use crate::stages::face::{check_face, FaceGate};
use crate::stages::iris::{crop_iris, localize_iris};
use crate::stages::sides::{assign_sides, crop_eye};

/// Tunables for a [`Pipeline`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PipelineConfig {
    /// Eye detection and cropping.
    pub eyes: EyeLocalizerConfig,
    /// Iris enhancement.
    pub enhance: EnhanceConfig,
    /// Retry behaviour for every external call.
    pub retry: RetryPolicy,
}

/// The external capabilities a pipeline talks to.
#[derive(Clone)]
pub struct Capabilities {
    /// Face detector for the presence gate.
    pub face: Arc<dyn Detector>,
    /// Eye detector.
    pub eyes: Arc<dyn Detector>,
    /// Iris detector, run per eye crop.
    pub iris: Arc<dyn Detector>,
    /// Leukocoria classifier.
    pub classifier: Arc<dyn LeukocoriaClassifier>,
}

/// Runs screenings. Holds no per-request state and can be shared.
pub struct Pipeline {
    capabilities: Capabilities,
    config: PipelineConfig,
}

impl Pipeline {
    /// Creates a pipeline over the given capabilities.
    #[must_use]
    pub const fn new(capabilities: Capabilities, config: PipelineConfig) -> Self {
        Self {
            capabilities,
            config,
        }
    }

    /// The configuration this pipeline was built with.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Decodes `bytes` and screens the image.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Input`] for undecodable bytes, otherwise the
    /// errors of [`Pipeline::run`].
    pub fn run_bytes(
        &self,
        bytes: &[u8],
        cancel: &CancellationToken,
    ) -> Result<PipelineResult, PipelineError> {
        let decoded = decode(bytes)?;
        self.run(&decoded, cancel)
    }

    /// Screens a decoded image.
    ///
    /// Gate outcomes (no face, wrong eye count, no iris) are returned as
    /// data. Only failures that leave no trustworthy answer are errors.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UpstreamUnavailable`] if a detector fails,
    /// [`PipelineError::ClassificationUnavailable`] if the classifier fails,
    /// or [`PipelineError::Cancelled`] if `cancel` fires before a call.
    pub fn run(
        &self,
        decoded: &DecodedImage,
        cancel: &CancellationToken,
    ) -> Result<PipelineResult, PipelineError> {
        let caller = Caller::new(&self.config.retry, cancel);
        let image = &decoded.image;
        debug!("state=Decoded {}x{}", decoded.width, decoded.height);

        if check_face(self.capabilities.face.as_ref(), image, &caller)? == FaceGate::Absent {
            debug!("state=NoFace");
            return Ok(PipelineResult::no_face());
        }
        debug!("state=FaceChecked");

        let (first, second) = match localize_eyes(
            self.capabilities.eyes.as_ref(),
            image,
            &self.config.eyes,
            &caller,
        )? {
            EyeLocalization::Pair(a, b) => (a, b),
            EyeLocalization::WrongCount(n) => {
                debug!("state=WrongEyeCount detected={n}");
                return Ok(PipelineResult::wrong_eye_count(n));
            }
        };

        let (left, right) = assign_sides(first, second);
        debug!(
            "state=EyesLocalized left={:?} right={:?}",
            left.bounds.to_array(),
            right.bounds.to_array()
        );

        let left_crop = crop_eye(image, EyeSide::Left, &left);
        let right_crop = crop_eye(image, EyeSide::Right, &right);

        let (left_report, right_report) = std::thread::scope(|s| {
            let right_handle = s.spawn(move || self.process_eye(right_crop, caller));
            let left_report = self.process_eye(left_crop, caller);
            let right_report = right_handle
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
            (left_report, right_report)
        });

        // Left failure wins when both sides fail.
        let (left_report, right_report) = match (left_report, right_report) {
            (Err(e), _) | (Ok(_), Err(e)) => return Err(e),
            (Ok(l), Ok(r)) => (l, r),
        };

        debug!(
            "state=Assembled left={:?} right={:?}",
            left_report.flag(),
            right_report.flag()
        );
        Ok(PipelineResult::analyzed(left_report, right_report))
    }

    /// Iris, enhancement and classification for one eye.
    fn process_eye(&self, crop: EyeCrop, caller: Caller<'_>) -> Result<EyeReport, PipelineError> {
        let side = crop.side;
        debug!("state=PerEye({side})");

        let Some(iris) = localize_iris(self.capabilities.iris.as_ref(), &crop, &caller)? else {
            debug!("No iris on {side} eye, leaving it indeterminate");
            return Ok(EyeReport {
                crop,
                iris: None,
                enhanced: None,
                classification: None,
            });
        };

        let iris_pixels = crop_iris(&crop, &iris).to_rgb8();
        let enhanced = enhance(&iris_pixels, &self.config.enhance)?;
        let classification = classify(
            self.capabilities.classifier.as_ref(),
            side,
            &enhanced,
            &caller,
        )?;

        Ok(EyeReport {
            crop,
            iris: Some(iris),
            enhanced: Some(enhanced),
            classification: Some(classification),
        })
    }
}
