//! Left/right assignment and eye cropping.

use std::cmp::Ordering;

use image::DynamicImage;

use super::eyes::LocatedEye;
use crate::domain::{EyeCrop, EyeSide};

/// Orders two eyes into `(left, right)` by image x.
///
/// Compares rescaled center x, then the crop's `x1`; a full tie keeps input
/// order. The result does not depend on argument order unless both keys tie.
#[must_use]
pub fn assign_sides(first: LocatedEye, second: LocatedEye) -> (LocatedEye, LocatedEye) {
    match compare(&first, &second) {
        Ordering::Greater => (second, first),
        Ordering::Less | Ordering::Equal => (first, second),
    }
}

fn compare(a: &LocatedEye, b: &LocatedEye) -> Ordering {
    a.detection
        .center_x
        .total_cmp(&b.detection.center_x)
        .then(a.bounds.x1.cmp(&b.bounds.x1))
}

/// Cuts the eye region out of the original image.
#[must_use]
pub fn crop_eye(image: &DynamicImage, side: EyeSide, eye: &LocatedEye) -> EyeCrop {
    let b = eye.bounds;
    EyeCrop {
        side,
        source_box: eye.detection,
        bounds: b,
        image: image.crop_imm(b.x1, b.y1, b.width(), b.height()),
    }
}
