//! Image encoding WASM bindings.
//!
//! Quality is the same 0.4 to 0.95 fraction the upload UI uses; values
//! outside that range are clamped.
//!
//! # Example
//!
//! ```typescript
//! import { encode_jpeg, encode_jpeg_from_image } from '@postframe/wasm';
//!
//! const jpeg = encode_jpeg(pixels, width, height, 0.8);
//! const again = encode_jpeg_from_image(image, 0.92);
//! ```

use crate::types::JsDecodedImage;
use postframe_core::decode::DecodedImage;
use postframe_core::encode::{self, JpegQuality};
use wasm_bindgen::prelude::*;

/// Encode RGB pixel data (3 bytes per pixel, row-major) to JPEG bytes.
///
/// # Errors
///
/// Returns an error if the pixel data length doesn't match
/// `width * height * 3`, if either dimension is zero, or if encoding fails.
#[wasm_bindgen]
pub fn encode_jpeg(
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    quality: f32,
) -> Result<Vec<u8>, JsValue> {
    let image = DecodedImage {
        width,
        height,
        pixels,
    };
    encode::encode_jpeg(&image, JpegQuality::new(quality))
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Encode a JsDecodedImage to JPEG bytes.
#[wasm_bindgen]
pub fn encode_jpeg_from_image(image: &JsDecodedImage, quality: f32) -> Result<Vec<u8>, JsValue> {
    encode::encode_jpeg(&image.to_decoded(), JpegQuality::new(quality))
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// The quality actually used for a requested value.
#[wasm_bindgen]
pub fn clamp_quality(quality: f32) -> f32 {
    JpegQuality::new(quality).value()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_jpeg_produces_jpeg() {
        let jpeg = encode_jpeg(vec![128u8; 8 * 8 * 3], 8, 8, 0.8).unwrap();
        assert_eq!(&jpeg[0..2], &[0xFF, 0xD8]);
        assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_encode_from_image_matches_raw() {
        let image = JsDecodedImage::new(4, 4, vec![60u8; 4 * 4 * 3]);
        let a = encode_jpeg_from_image(&image, 0.9).unwrap();
        let b = encode_jpeg(image.pixels(), 4, 4, 0.9).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_clamp_quality() {
        assert_eq!(clamp_quality(0.1), 0.4);
        assert_eq!(clamp_quality(1.0), 0.95);
        assert_eq!(clamp_quality(0.8), 0.8);
    }
}
