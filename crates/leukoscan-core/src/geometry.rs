//! Coordinate-space transforms between the inference image and the original.

// Pixel coordinates fit comfortably in f32 for any decodable image.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]

use crate::domain::{DetectionBox, PixelRect};

/// Scale factor applied before inference so the longest side is at most `max_dim`.
///
/// Returns `1.0` when the image already fits.
#[must_use]
pub fn inference_scale(width: u32, height: u32, max_dim: u32) -> f32 {
    let longest = width.max(height);
    if max_dim == 0 || longest <= max_dim {
        1.0
    } else {
        max_dim as f32 / longest as f32
    }
}

/// Dimensions of the downscaled inference image (truncated, at least 1).
#[must_use]
pub fn scaled_dimensions(width: u32, height: u32, scale: f32) -> (u32, u32) {
    let w = ((width as f32 * scale) as u32).max(1);
    let h = ((height as f32 * scale) as u32).max(1);
    (w, h)
}

/// Maps a box detected on an image scaled by `scale` back to the original.
#[must_use]
pub fn to_original(detection: &DetectionBox, scale: f32) -> DetectionBox {
    DetectionBox::new(
        detection.center_x / scale,
        detection.center_y / scale,
        detection.width / scale,
        detection.height / scale,
        detection.confidence,
    )
}

/// Maps a box in original coordinates onto an image scaled by `scale`.
#[must_use]
pub fn to_inference(detection: &DetectionBox, scale: f32) -> DetectionBox {
    DetectionBox::new(
        detection.center_x * scale,
        detection.center_y * scale,
        detection.width * scale,
        detection.height * scale,
        detection.confidence,
    )
}

/// Widens a box around its center.
#[must_use]
pub fn expand(detection: &DetectionBox, scale_w: f32, scale_h: f32) -> DetectionBox {
    DetectionBox::new(
        detection.center_x,
        detection.center_y,
        detection.width * scale_w,
        detection.height * scale_h,
        detection.confidence,
    )
}

/// Converts a box to integer corners clipped to `[0, width) x [0, height)`.
///
/// Corners are truncated toward zero before clipping. Returns `None` when the
/// clipped rectangle is empty.
#[must_use]
pub fn clip_to_image(detection: &DetectionBox, width: u32, height: u32) -> Option<PixelRect> {
    let [x_min, y_min, x_max, y_max] = detection.corners();

    let x1 = clip_coord(x_min, width);
    let y1 = clip_coord(y_min, height);
    let x2 = clip_coord(x_max, width);
    let y2 = clip_coord(y_max, height);

    let rect = PixelRect { x1, y1, x2, y2 };
    if rect.is_empty() {
        None
    } else {
        Some(rect)
    }
}

fn clip_coord(value: f32, limit: u32) -> u32 {
    // `as` saturates and maps NaN to zero.
    let truncated = value.trunc() as i64;
    truncated.clamp(0, i64::from(limit)) as u32
}
