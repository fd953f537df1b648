//! JPEG encoding for crop confirmation and publish.
//!
//! Every image leaving the client is a JPEG produced here. Quality is
//! expressed the way the upload UI exposes it (a float slider from 0.4 to
//! 0.95) and mapped onto the `image` crate's 1-100 scale. The encoder is
//! deterministic: the same raster at the same quality yields the same bytes.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decode::DecodedImage;

/// MIME type attached to every upload.
pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

/// Errors that can occur during JPEG encoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// Pixel data length doesn't match expected dimensions
    #[error("Invalid pixel data: expected {expected} bytes (width * height * 3), got {actual}")]
    InvalidPixelData { expected: usize, actual: usize },

    /// Width or height is zero
    #[error("Invalid dimensions: width ({width}) and height ({height}) must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    /// JPEG encoding failed
    #[error("JPEG encoding failed: {0}")]
    EncodingFailed(String),
}

/// JPEG quality as a fraction, clamped to `[0.4, 0.95]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "f32", into = "f32")]
pub struct JpegQuality(f32);

impl JpegQuality {
    pub const MIN: f32 = 0.4;
    pub const MAX: f32 = 0.95;

    /// Clamp `value` into the supported range. Non-finite input maps to the
    /// default.
    pub fn new(value: f32) -> Self {
        if !value.is_finite() {
            return Self::default();
        }
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    pub fn value(self) -> f32 {
        self.0
    }

    /// Quality on the encoder's 1-100 scale.
    pub fn as_percent(self) -> u8 {
        (self.0 * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

impl Default for JpegQuality {
    fn default() -> Self {
        Self(0.8)
    }
}

impl From<f32> for JpegQuality {
    fn from(value: f32) -> Self {
        Self::new(value)
    }
}

impl From<JpegQuality> for f32 {
    fn from(quality: JpegQuality) -> Self {
        quality.0
    }
}

/// Encode an RGB raster to JPEG bytes.
///
/// # Errors
///
/// Returns an error when the raster has a zero edge, when its buffer length
/// disagrees with its dimensions, or when the encoder fails.
pub fn encode_jpeg(image: &DecodedImage, quality: JpegQuality) -> Result<Vec<u8>, EncodeError> {
    let (width, height) = (image.width, image.height);
    if width == 0 || height == 0 {
        return Err(EncodeError::InvalidDimensions { width, height });
    }

    let expected = (width as usize) * (height as usize) * 3;
    if image.pixels.len() != expected {
        return Err(EncodeError::InvalidPixelData {
            expected,
            actual: image.pixels.len(),
        });
    }

    let mut buffer = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buffer, quality.as_percent())
        .write_image(&image.pixels, width, height, ExtendedColorType::Rgb8)
        .map_err(|e| EncodeError::EncodingFailed(e.to_string()))?;

    Ok(buffer.into_inner())
}
