//! Image decoding WASM bindings.
//!
//! # Functions
//!
//! - [`decode_image`] - Decode a JPEG or PNG with EXIF orientation applied
//! - [`probe_dimensions`] - Upright dimensions from the header alone
//! - [`downscale_to_fit`] - Shrink an image so its longest edge fits
//!
//! # Example
//!
//! ```typescript
//! import { decode_image, probe_dimensions } from '@postframe/wasm';
//!
//! const bytes = new Uint8Array(await file.arrayBuffer());
//! const [width, height] = probe_dimensions(bytes);
//! const image = decode_image(bytes);
//! ```

use crate::types::JsDecodedImage;
use postframe_core::decode;
use wasm_bindgen::prelude::*;

/// Decode image bytes into RGB pixels, applying EXIF orientation.
#[wasm_bindgen]
pub fn decode_image(bytes: &[u8]) -> Result<JsDecodedImage, JsValue> {
    decode::decode_image(bytes)
        .map(JsDecodedImage::from_decoded)
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Upright `[width, height]` without decoding pixels.
#[wasm_bindgen]
pub fn probe_dimensions(bytes: &[u8]) -> Result<Vec<u32>, JsValue> {
    decode::probe_dimensions(bytes)
        .map(|(width, height)| vec![width, height])
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Shrink `image` so neither edge exceeds `max_edge`. Smaller images are
/// returned unchanged.
#[wasm_bindgen]
pub fn downscale_to_fit(image: &JsDecodedImage, max_edge: u32) -> JsDecodedImage {
    JsDecodedImage::from_decoded(decode::downscale_to_fit(&image.to_decoded(), max_edge))
}


#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_decode_image_invalid() {
        assert!(decode_image(&[0, 1, 2, 3]).is_err());
    }

    #[wasm_bindgen_test]
    fn test_decode_image_empty() {
        assert!(decode_image(&[]).is_err());
    }

    #[wasm_bindgen_test]
    fn test_probe_dimensions_invalid() {
        assert!(probe_dimensions(&[0, 1, 2, 3]).is_err());
    }
}
