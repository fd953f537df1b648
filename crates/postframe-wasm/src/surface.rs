//! Crop surface WASM bindings.
//!
//! Wraps [`CropSurface`] for the browser: pointer events and the zoom
//! slider go in, preview pixels and the confirmed JPEG come out.
//!
//! # Example
//!
//! ```typescript
//! const surface = JsCropSurface.avatar();
//! surface.load(bytes);
//! canvas.onpointerdown = (e) => surface.pointer_down(e.offsetX, e.offsetY);
//! canvas.onpointermove = (e) => surface.pointer_move(e.offsetX, e.offsetY) && redraw();
//! canvas.onpointerup = () => surface.pointer_up();
//! slider.oninput = () => { surface.set_zoom(+slider.value); redraw(); };
//!
//! function redraw() {
//!   const frame = surface.render_preview();
//!   ctx.putImageData(new ImageData(new Uint8ClampedArray(frame.rgba()), frame.width), 0, 0);
//! }
//! const jpeg = surface.confirm();
//! ```

use postframe_core::config::{CropPreset, PipelineConfig};
use postframe_core::source::{SourceId, SourceImage};
use postframe_core::surface::{CropOutput, CropSurface, SurfaceError, SurfaceOptions, SurfaceStatus};
use wasm_bindgen::prelude::*;

use crate::types::JsDecodedImage;

#[wasm_bindgen]
pub struct JsCropSurface {
    inner: CropSurface,
}

#[wasm_bindgen]
impl JsCropSurface {
    /// Surface for an arbitrary aspect (width / height) and export width.
    #[wasm_bindgen(constructor)]
    pub fn new(aspect: f64, output_width: u32) -> JsCropSurface {
        Self::from_preset(CropPreset::new(aspect, output_width))
    }

    /// Square profile picture surface.
    pub fn avatar() -> JsCropSurface {
        Self::from_preset(CropPreset::AVATAR)
    }

    /// Full-screen 9:16 story surface.
    pub fn story() -> JsCropSurface {
        Self::from_preset(CropPreset::STORY)
    }

    /// Decode and show `bytes`. On failure the surface stays unusable
    /// until another image loads.
    pub fn load(&mut self, bytes: &[u8]) -> Result<(), JsValue> {
        let source = SourceImage::new(SourceId(0), "", bytes);
        self.inner
            .load(&source)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// `"empty"`, `"ready"` or `"failed"`.
    pub fn status(&self) -> String {
        match self.inner.status() {
            SurfaceStatus::Empty => "empty",
            SurfaceStatus::Ready => "ready",
            SurfaceStatus::Failed => "failed",
        }
        .to_string()
    }

    pub fn is_ready(&self) -> bool {
        self.inner.is_ready()
    }

    /// Message of the last load failure.
    pub fn load_error(&self) -> Option<String> {
        self.inner.load_error().map(ToString::to_string)
    }

    pub fn pointer_down(&mut self, x: f64, y: f64) -> bool {
        self.inner.pointer_down(x, y)
    }

    /// Returns true when the transform changed and the preview needs a
    /// redraw.
    pub fn pointer_move(&mut self, x: f64, y: f64) -> bool {
        self.inner.pointer_move(x, y).is_some()
    }

    pub fn pointer_up(&mut self) {
        self.inner.pointer_up();
    }

    pub fn pointer_leave(&mut self) {
        self.inner.pointer_leave();
    }

    /// Set the zoom from the slider. Returns the clamped value.
    pub fn set_zoom(&mut self, zoom: f64) -> f64 {
        self.inner.set_zoom(zoom).zoom
    }

    pub fn reset(&mut self) {
        self.inner.reset();
    }

    pub fn rotate_clockwise(&mut self) {
        self.inner.rotate_clockwise();
    }

    pub fn rotate_counter_clockwise(&mut self) {
        self.inner.rotate_counter_clockwise();
    }

    pub fn toggle_flip(&mut self) {
        self.inner.toggle_flip();
    }

    pub fn set_aspect(&mut self, aspect: f64) {
        self.inner.set_aspect(aspect);
    }

    #[wasm_bindgen(getter)]
    pub fn zoom(&self) -> f64 {
        self.inner.transform().zoom
    }

    #[wasm_bindgen(getter)]
    pub fn max_zoom(&self) -> f64 {
        self.inner.options().max_zoom
    }

    #[wasm_bindgen(getter)]
    pub fn pan_x(&self) -> f64 {
        self.inner.transform().pan_x
    }

    #[wasm_bindgen(getter)]
    pub fn pan_y(&self) -> f64 {
        self.inner.transform().pan_y
    }

    #[wasm_bindgen(getter)]
    pub fn rotation(&self) -> u16 {
        self.inner.transform().rotation_deg
    }

    #[wasm_bindgen(getter)]
    pub fn flipped(&self) -> bool {
        self.inner.transform().flip_horizontal
    }

    #[wasm_bindgen(getter)]
    pub fn aspect(&self) -> f64 {
        self.inner.transform().aspect
    }

    #[wasm_bindgen(getter)]
    pub fn viewport_width(&self) -> u32 {
        self.inner.viewport().0
    }

    #[wasm_bindgen(getter)]
    pub fn viewport_height(&self) -> u32 {
        self.inner.viewport().1
    }

    /// Current transform as a plain object.
    pub fn transform(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.inner.transform())
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Crop window as fractions of the oriented source.
    pub fn normalized_rect(&self) -> Result<JsValue, JsValue> {
        let rect = self
            .inner
            .normalized_rect()
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        serde_wasm_bindgen::to_value(&rect).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Preview frame at viewport size.
    pub fn render_preview(&self) -> Result<JsDecodedImage, JsValue> {
        self.inner
            .render_preview()
            .map(JsDecodedImage::from_decoded)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Export the current framing as JPEG bytes.
    pub fn confirm(&self) -> Result<Vec<u8>, JsValue> {
        self.confirm_output()
            .map(|output| output.encoded)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }
}

impl JsCropSurface {
    fn from_preset(preset: CropPreset) -> Self {
        Self::from_options(SurfaceOptions::from_config(&PipelineConfig::default(), preset))
    }

    pub(crate) fn from_options(options: SurfaceOptions) -> Self {
        Self {
            inner: CropSurface::new(options),
        }
    }

    pub(crate) fn from_surface(inner: CropSurface) -> Self {
        Self { inner }
    }

    pub(crate) fn confirm_output(&self) -> Result<CropOutput, SurfaceError> {
        self.inner.confirm()
    }
}


#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_load_invalid_bytes() {
        let mut surface = JsCropSurface::avatar();
        assert!(surface.load(&[1, 2, 3]).is_err());
        assert_eq!(surface.status(), "failed");
        assert!(surface.load_error().is_some());
        assert!(surface.confirm().is_err());
    }

    #[wasm_bindgen_test]
    fn test_transform_to_js() {
        let surface = JsCropSurface::avatar();
        let value = surface.transform().unwrap();
        assert!(value.is_object());
    }
}
