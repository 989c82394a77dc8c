//! Request-level entry point: raw upload in, status and JSON body out.
//!
//! Transport framing (HTTP routing, multipart parsing) belongs to the caller.
//! This module owns the mapping from pipeline results and errors to the
//! response shape and status codes.

use serde::Serialize;
use tracing::{info, warn};

use crate::domain::{EyeReport, EyeSide, PipelineError, PipelineResult};
use crate::pipeline::Pipeline;
use crate::ports::{ResultStore, StoredRecord};
use crate::retry::CancellationToken;

/// Warning returned when the request carried no image.
pub const NO_IMAGE_WARNING: &str = "No image provided.";

/// A value per eye side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SidePair<T> {
    /// Image-left eye.
    pub left: T,
    /// Image-right eye.
    pub right: T,
}

/// Summary of one eye in a response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EyeSummary {
    /// Eye crop `[x1, y1, x2, y2]` in the original image.
    pub bounds: [u32; 4],
    /// Iris `[x1, y1, x2, y2]` within the eye crop, if one was found.
    pub iris: Option<[u32; 4]>,
    /// Classifier probability, if classified.
    pub score: Option<f32>,
    /// Stored eye image reference, if a store was used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Body of a successful screening.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreeningResponse {
    /// Stored record id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Stored original image reference.
    pub original: Option<String>,
    /// Per-eye summaries; `null` unless both eyes were analyzed.
    pub two_eyes: Option<SidePair<EyeSummary>>,
    /// Per-eye flags; `null` unless both eyes were analyzed. A side without
    /// an iris is `null` inside the pair.
    pub leukocoria: Option<SidePair<Option<bool>>>,
    /// Ordered warnings.
    pub warnings: Vec<String>,
}

/// Body of a failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    /// Stable machine-readable code.
    pub error: String,
    /// Human-readable message.
    pub message: String,
    /// Ordered warnings.
    pub warnings: Vec<String>,
}

/// Either response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    /// Successful screening, including gate outcomes.
    Screening(ScreeningResponse),
    /// Failure.
    Error(ErrorBody),
}

/// Status and body for one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngressResponse {
    /// HTTP-equivalent status.
    pub status: u16,
    /// JSON body.
    pub body: ResponseBody,
}

impl IngressResponse {
    /// True for 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Handles one screening request.
///
/// `payload` is `None` when the request carried no image. The store is
/// optional; store failures are logged and never change the response status.
pub fn handle(
    pipeline: &Pipeline,
    payload: Option<&[u8]>,
    original_name: &str,
    store: Option<&dyn ResultStore>,
    cancel: &CancellationToken,
) -> IngressResponse {
    let Some(bytes) = payload else {
        return missing_image();
    };

    match pipeline.run_bytes(bytes, cancel) {
        Ok(result) => {
            let record = store.and_then(|s| match s.store(bytes, original_name, &result) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Failed to store screening for {original_name}: {e:#}");
                    None
                }
            });
            info!(
                "Screened {original_name}: left={:?} right={:?} warnings={}",
                result.flag(EyeSide::Left),
                result.flag(EyeSide::Right),
                result.warnings.len()
            );
            IngressResponse {
                status: 200,
                body: ResponseBody::Screening(screening_response(&result, record.as_ref())),
            }
        }
        Err(e) => error_response(&e),
    }
}

/// Builds the success body from a result and optional stored references.
#[must_use]
pub fn screening_response(
    result: &PipelineResult,
    record: Option<&StoredRecord>,
) -> ScreeningResponse {
    let (two_eyes, leukocoria) = match result.eyes() {
        Some(pair) => {
            let image = |side| {
                record.and_then(|r| match side {
                    EyeSide::Left => r.left_eye.clone(),
                    EyeSide::Right => r.right_eye.clone(),
                })
            };
            (
                Some(SidePair {
                    left: summarize(&pair.left, image(EyeSide::Left)),
                    right: summarize(&pair.right, image(EyeSide::Right)),
                }),
                Some(SidePair {
                    left: pair.left.flag(),
                    right: pair.right.flag(),
                }),
            )
        }
        None => (None, None),
    };

    ScreeningResponse {
        id: record.and_then(|r| r.id),
        original: record.map(|r| r.original.clone()),
        two_eyes,
        leukocoria,
        warnings: result.warnings.clone(),
    }
}

/// Maps a pipeline error to its status and body.
#[must_use]
pub fn error_response(error: &PipelineError) -> IngressResponse {
    warn!("Screening failed: {}", error_chain(error));
    IngressResponse {
        status: error.status(),
        body: ResponseBody::Error(ErrorBody {
            error: error.code().to_string(),
            message: error_chain(error),
            warnings: Vec::new(),
        }),
    }
}

fn missing_image() -> IngressResponse {
    IngressResponse {
        status: 400,
        body: ResponseBody::Error(ErrorBody {
            error: "invalid_input".to_string(),
            message: NO_IMAGE_WARNING.to_string(),
            warnings: vec![NO_IMAGE_WARNING.to_string()],
        }),
    }
}

fn summarize(report: &EyeReport, image: Option<String>) -> EyeSummary {
    EyeSummary {
        bounds: report.crop.bounds.to_array(),
        iris: report.iris.map(|i| i.bounds.to_array()),
        score: report.classification.map(|c| c.score),
        image,
    }
}

/// `outer: inner: innermost`, like anyhow's alternate display.
fn error_chain(error: &PipelineError) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}
