//! Preset filter WASM bindings.
//!
//! The review screen shows filters live with the CSS string from
//! [`filter_css`]; the pixels themselves are filtered once at upload time by
//! the pipeline. [`apply_filter`] is exposed for thumbnails and exports that
//! need the real raster.

use std::str::FromStr;

use crate::types::JsDecodedImage;
use postframe_core::filter::{self, FilterSpec};
use wasm_bindgen::prelude::*;

fn parse(name: &str) -> Result<FilterSpec, JsValue> {
    FilterSpec::from_str(name).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Filtered copy of `image`. `name` is one of `none`, `warm`, `cool`,
/// `mono`, `vintage`.
#[wasm_bindgen]
pub fn apply_filter(image: &JsDecodedImage, name: &str) -> Result<JsDecodedImage, JsValue> {
    let spec = parse(name)?;
    Ok(JsDecodedImage::from_decoded(filter::apply_filter(
        &image.to_decoded(),
        spec,
    )))
}

/// CSS `filter` value matching a preset.
#[wasm_bindgen]
pub fn filter_css(name: &str) -> Result<String, JsValue> {
    parse(name).map(FilterSpec::css)
}

/// Preset names in menu order.
#[wasm_bindgen]
pub fn filter_names() -> Vec<JsValue> {
    FilterSpec::ALL
        .iter()
        .map(|spec| JsValue::from_str(spec.name()))
        .collect()
}
