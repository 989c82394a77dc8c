//! Test support utilities for leukoscan.
//!
//! Provides mocks of every capability port, synthetic image builders, and a
//! canned HTTP server for exercising the network adapters.
//!
//! # Example
//!
//! ```
//! use leukoscan_test_support::{MockClassifier, MockDetector, SyntheticImageBuilder};
//!
//! let scene = SyntheticImageBuilder::face_scene(400, 300, 230, 26);
//! let eyes = MockDetector::returning("eyes", scene.eyes_with_confidence(0.9, 0.8));
//! let classifier = MockClassifier::by_brightness();
//! ```

mod builders;
mod http;
mod mocks;

pub use builders::{FaceScene, SyntheticImageBuilder};
pub use http::{CannedHttpServer, CapturedRequest};
pub use mocks::{mean_brightness, MockClassifier, MockDetector, MockResultStore, StoreCall};
