//! Detector output types.

use serde::{Deserialize, Serialize};

/// A single detection reported by a detector capability.
///
/// Coordinates use the center/size convention of the hosted detectors and are
/// expressed in the pixel space of the image the detector was called on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionBox {
    /// Horizontal center in pixels.
    pub center_x: f32,
    /// Vertical center in pixels.
    pub center_y: f32,
    /// Box width in pixels (never negative).
    pub width: f32,
    /// Box height in pixels (never negative).
    pub height: f32,
    /// Detector confidence (0.0 to 1.0).
    pub confidence: f32,
}

impl DetectionBox {
    /// Creates a detection box, clamping negative sizes to zero and the
    /// confidence into `[0, 1]`.
    #[must_use]
    pub fn new(center_x: f32, center_y: f32, width: f32, height: f32, confidence: f32) -> Self {
        Self {
            center_x,
            center_y,
            width: width.max(0.0),
            height: height.max(0.0),
            confidence: if confidence.is_nan() {
                0.0
            } else {
                confidence.clamp(0.0, 1.0)
            },
        }
    }

    /// Bounding area (`width * height`).
    #[must_use]
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Returns `[x_min, y_min, x_max, y_max]` as floats.
    #[must_use]
    pub fn corners(&self) -> [f32; 4] {
        let half_w = self.width / 2.0;
        let half_h = self.height / 2.0;
        [
            self.center_x - half_w,
            self.center_y - half_h,
            self.center_x + half_w,
            self.center_y + half_h,
        ]
    }
}

/// Integer pixel rectangle with exclusive upper corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRect {
    /// Left edge (inclusive).
    pub x1: u32,
    /// Top edge (inclusive).
    pub y1: u32,
    /// Right edge (exclusive).
    pub x2: u32,
    /// Bottom edge (exclusive).
    pub y2: u32,
}

impl PixelRect {
    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }

    /// True when the rectangle covers no pixels.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Returns the corners as `[x1, y1, x2, y2]`.
    #[must_use]
    pub const fn to_array(&self) -> [u32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}
