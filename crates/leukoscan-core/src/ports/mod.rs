//! Port definitions for hexagonal architecture.
//!
//! These traits are the only way the pipeline talks to the outside world:
//! detectors, the classifier and the optional result store.

mod classifier;
mod detector;
mod result_store;

pub use classifier::LeukocoriaClassifier;
pub use detector::Detector;
pub use result_store::{ResultStore, StoredRecord};
