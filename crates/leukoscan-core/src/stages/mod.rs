//! Pipeline stages, in the order the orchestrator runs them.

pub mod classify;
pub mod enhance;
pub mod eyes;
pub mod face;
pub mod iris;
pub mod sides;

pub use enhance::{EnhanceConfig, CANONICAL_SIZE};
pub use eyes::{EyeLocalization, EyeLocalizerConfig, LocatedEye};
pub use face::FaceGate;
