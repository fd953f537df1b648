//! Crop geometry WASM bindings.
//!
//! Pure math helpers for hosts that draw their own crop overlay.

use postframe_core::geometry::{self, ViewportBounds};
use wasm_bindgen::prelude::*;

/// Crop window `[sx, sy, sw, sh]` in source pixels.
#[wasm_bindgen]
pub fn compute_crop_rect(
    source_width: u32,
    source_height: u32,
    zoom: f64,
    pan_x: f64,
    pan_y: f64,
    aspect: f64,
) -> Vec<f64> {
    let rect = geometry::compute_crop_rect(source_width, source_height, zoom, pan_x, pan_y, aspect);
    vec![rect.sx, rect.sy, rect.sw, rect.sh]
}

/// Legal pan offset `[x, y]` in destination pixels.
#[wasm_bindgen]
pub fn max_offset(src_w: u32, src_h: u32, dst_w: u32, dst_h: u32, zoom: f64) -> Vec<f64> {
    let (x, y) = geometry::max_offset(src_w, src_h, dst_w, dst_h, zoom);
    vec![x, y]
}

/// Export `[width, height]` for an output width and aspect.
#[wasm_bindgen]
pub fn output_dimensions(output_width: u32, aspect: f64) -> Vec<u32> {
    let (width, height) = geometry::output_dimensions(output_width, aspect);
    vec![width, height]
}

/// Preview canvas `[width, height]` for an aspect with the default bounds.
#[wasm_bindgen]
pub fn viewport_for_aspect(aspect: f64) -> Vec<u32> {
    let (width, height) = geometry::viewport_for_aspect(aspect, ViewportBounds::default());
    vec![width, height]
}

#[wasm_bindgen]
pub fn story_aspect() -> f64 {
    geometry::STORY_ASPECT
}
