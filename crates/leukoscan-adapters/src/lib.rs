//! Leukoscan Adapters - External adapters for leukoscan.
//!
//! This crate provides adapters for:
//! - Hosted face, eye and iris detection
//! - The remote leukocoria classifier
//! - Filesystem result storage
//! - Model downloading and caching

pub mod client;
pub mod hosted;
pub mod models;
pub mod remote;
pub mod store;

pub use client::{blocking_client, DEFAULT_TIMEOUT};
pub use hosted::HostedDetector;
pub use models::{model_path, models_dir, set_models_dir};
pub use remote::RemoteClassifier;
pub use store::{FsResultStore, ScreeningRecord};
