//! Leukoscan Core - Domain logic and the screening pipeline
//!
//! This crate contains the domain types, capability ports, every pipeline
//! stage, the orchestrator, the ingress response mapping, and the in-process
//! leukocoria classifier.

pub mod codec;
pub mod domain;
pub mod geometry;
pub mod inference;
pub mod ingress;
pub mod pipeline;
pub mod ports;
pub mod retry;
pub mod stages;

pub use codec::{decode, decode_file, DecodedImage};
pub use domain::{
    Capability, ClassificationResult, DecodeError, DetectionBox, EnhancedCrop, EyeCrop, EyePair,
    EyeReport, EyeSide, IrisPrediction, Outcome, PipelineError, PipelineResult, PixelRect,
};
pub use inference::LocalClassifier;
pub use ingress::{handle, IngressResponse, ResponseBody, ScreeningResponse};
pub use pipeline::{Capabilities, Pipeline, PipelineConfig};
pub use ports::{Detector, LeukocoriaClassifier, ResultStore, StoredRecord};
pub use retry::{CancellationToken, RetryPolicy};
pub use stages::{EnhanceConfig, EyeLocalizerConfig, CANONICAL_SIZE};
