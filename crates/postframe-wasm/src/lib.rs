//! Postframe WASM - WebAssembly bindings for postframe-core
//!
//! Exposes the crop surface, preset filters and the publish pipeline to the
//! web client. Storage and database calls stay in JavaScript; the pipeline
//! hands out upload payloads and takes the results back.
//!
//! # Module Structure
//!
//! - `surface` - Interactive crop surface (pan, zoom, rotate, confirm)
//! - `pipeline` - Multi-image publish pipeline
//! - `filter` - Preset filters and their CSS equivalents
//! - `geometry` - Crop math for hosts that draw their own overlay
//! - `decode` / `encode` - Image decoding and JPEG export
//! - `types` - WASM-compatible wrapper types for image data
//!
//! # Usage
//!
//! ```typescript
//! import init, { JsCropSurface, set_log_level } from '@postframe/wasm';
//!
//! await init();
//! set_log_level('debug');
//!
//! const surface = JsCropSurface.avatar();
//! surface.load(new Uint8Array(await file.arrayBuffer()));
//! const jpeg = surface.confirm();
//! ```

use wasm_bindgen::prelude::*;

mod decode;
mod encode;
mod filter;
mod geometry;
mod logger;
mod pipeline;
mod surface;
mod types;

pub use decode::{decode_image, downscale_to_fit, probe_dimensions};
pub use encode::{clamp_quality, encode_jpeg, encode_jpeg_from_image};
pub use filter::{apply_filter, filter_css, filter_names};
pub use geometry::{compute_crop_rect, max_offset, output_dimensions, story_aspect, viewport_for_aspect};
pub use pipeline::JsPublishPipeline;
pub use surface::JsCropSurface;
pub use types::JsDecodedImage;

/// Initialize the WASM module (called automatically on load)
#[wasm_bindgen(start)]
pub fn init() {
    logger::install(log::LevelFilter::Info);
}

/// Change how much the library logs to the browser console.
///
/// Accepts `off`, `error`, `warn`, `info`, `debug` or `trace`; anything else
/// means `info`.
#[wasm_bindgen]
pub fn set_log_level(level: &str) {
    log::set_max_level(logger::parse_level(level));
}

/// Get the version of the WASM module
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }

    #[test]
    fn test_set_log_level() {
        set_log_level("trace");
        assert_eq!(log::max_level(), log::LevelFilter::Trace);
        set_log_level("bogus");
        assert_eq!(log::max_level(), log::LevelFilter::Info);
    }
}
