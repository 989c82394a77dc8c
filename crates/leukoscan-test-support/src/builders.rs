//! Synthetic image builders for testing.

// Scene geometry is computed in f32 from small integer dimensions.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]

use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use leukoscan_core::domain::DetectionBox;

/// Fraction of the image width at which the image-left eye sits.
const LEFT_EYE_X: f32 = 0.35;
/// Fraction of the image width at which the image-right eye sits.
const RIGHT_EYE_X: f32 = 0.65;
/// Fraction of the image height at which both eyes sit.
const EYE_Y: f32 = 0.45;
/// Eye box size as fractions of the image.
const EYE_W: f32 = 0.08;
const EYE_H: f32 = 0.03;
/// Half-extent of the flat patch painted around each eye.
const PATCH_HALF_W: f32 = 0.1;
const PATCH_HALF_H: f32 = 0.15;

/// A synthetic portrait with two flat eye patches.
///
/// The eye boxes are in full-resolution pixel coordinates. Each widened
/// eye crop (2x width, 5x height) falls entirely inside its patch, so every
/// crop and iris sub-crop is a single flat color.
#[derive(Debug, Clone)]
pub struct FaceScene {
    /// The image.
    pub image: DynamicImage,
    /// Eye box on the image-left side.
    pub left_eye: DetectionBox,
    /// Eye box on the image-right side.
    pub right_eye: DetectionBox,
}

impl FaceScene {
    /// The eye boxes with the given confidences, in `[left, right]` order.
    #[must_use]
    pub fn eyes_with_confidence(&self, left: f32, right: f32) -> Vec<DetectionBox> {
        vec![
            DetectionBox { confidence: left, ..self.left_eye },
            DetectionBox { confidence: right, ..self.right_eye },
        ]
    }

    /// Encodes the scene as PNG.
    #[must_use]
    pub fn png_bytes(&self) -> Vec<u8> {
        SyntheticImageBuilder::png_bytes(&self.image)
    }
}

/// Builder for creating synthetic test images.
pub struct SyntheticImageBuilder;

impl SyntheticImageBuilder {
    /// Creates a gray portrait with two flat eye patches of the given values.
    #[must_use]
    pub fn face_scene(width: u32, height: u32, left_value: u8, right_value: u8) -> FaceScene {
        let (w, h) = (width as f32, height as f32);
        let patch = |cx: f32, x: u32, y: u32| {
            (x as f32 - cx).abs() <= PATCH_HALF_W * w
                && (y as f32 - EYE_Y * h).abs() <= PATCH_HALF_H * h
        };

        let img = RgbImage::from_fn(width, height, |x, y| {
            if patch(LEFT_EYE_X * w, x, y) {
                Rgb([left_value; 3])
            } else if patch(RIGHT_EYE_X * w, x, y) {
                Rgb([right_value; 3])
            } else {
                Rgb([128, 128, 128])
            }
        });

        let eye = |cx: f32| DetectionBox::new(cx * w, EYE_Y * h, EYE_W * w, EYE_H * h, 0.9);
        FaceScene {
            image: DynamicImage::ImageRgb8(img),
            left_eye: eye(LEFT_EYE_X),
            right_eye: eye(RIGHT_EYE_X),
        }
    }

    /// A face box covering the middle of a `width` x `height` image.
    #[must_use]
    pub fn face_box(width: u32, height: u32) -> DetectionBox {
        let (w, h) = (width as f32, height as f32);
        DetectionBox::new(w * 0.5, h * 0.5, w * 0.6, h * 0.8, 0.95)
    }

    /// An iris box centered in a crop of the given size, half as wide and high.
    #[must_use]
    pub fn centered_iris(width: u32, height: u32) -> DetectionBox {
        let (w, h) = (width as f32, height as f32);
        DetectionBox::new(w * 0.5, h * 0.5, w * 0.5, h * 0.5, 0.9)
    }

    /// Creates a uniform gray image.
    #[must_use]
    pub fn uniform_gray(width: u32, height: u32, value: u8) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([value])))
    }

    /// Encodes any image as PNG.
    ///
    /// # Panics
    ///
    /// Panics if encoding fails.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn png_bytes(image: &DynamicImage) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        image
            .write_to(&mut buf, ImageFormat::Png)
            .expect("PNG encoding of an in-memory image");
        buf.into_inner()
    }
}
