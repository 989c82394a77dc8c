//! Image decoding and encoding.

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, GenericImageView, ImageFormat};
use tracing::debug;

use crate::domain::DecodeError;

/// A decoded upload.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Channels per pixel.
    pub channels: u8,
    /// Decoded pixels.
    pub image: DynamicImage,
}

impl DecodedImage {
    /// Wraps an already decoded image.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::ZeroDimensions`] if the image has no pixels.
    pub fn from_image(image: DynamicImage) -> Result<Self, DecodeError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(DecodeError::ZeroDimensions { width, height });
        }
        Ok(Self {
            width,
            height,
            channels: image.color().channel_count(),
            image,
        })
    }
}

/// Decodes raw bytes, sniffing the format from the content.
///
/// # Errors
///
/// Returns a [`DecodeError`] if the buffer is empty, not a supported image,
/// or decodes to zero dimensions.
pub fn decode(bytes: &[u8]) -> Result<DecodedImage, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }

    let image = image::load_from_memory(bytes).map_err(DecodeError::Malformed)?;
    let decoded = DecodedImage::from_image(image)?;

    debug!(
        "Decoded {}x{} image with {} channel(s)",
        decoded.width, decoded.height, decoded.channels
    );
    Ok(decoded)
}

/// Reads a file and decodes it with the same rules as [`decode`].
///
/// # Errors
///
/// Returns [`DecodeError::Io`] if the file cannot be read, otherwise the
/// errors of [`decode`].
pub fn decode_file(path: impl AsRef<Path>) -> Result<DecodedImage, DecodeError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| DecodeError::Io {
        path: path.display().to_string(),
        source,
    })?;
    decode(&bytes)
}

/// Encodes an image as JPEG (alpha is dropped).
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn encode_jpeg(image: &DynamicImage) -> image::ImageResult<Vec<u8>> {
    let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
    let mut buf = Cursor::new(Vec::new());
    rgb.write_to(&mut buf, ImageFormat::Jpeg)?;
    Ok(buf.into_inner())
}

/// Encodes an image as PNG.
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn encode_png(image: &DynamicImage) -> image::ImageResult<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}
