//! Shared inference utilities.

/// Logistic function mapping a logit to a probability.
#[inline]
#[must_use]
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
