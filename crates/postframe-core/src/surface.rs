//! Interactive crop surface.
//!
//! The surface owns one image at a time and the user's current
//! [`CropTransform`] for it. It has two independent pieces of state:
//!
//! - **Load state**: `Empty`, `Ready` or `Failed`. Rendering and confirm are
//!   only available when `Ready`.
//! - **Drag state**: `Idle` or `Dragging`. A drag pans the image; zoom comes
//!   from the slider and updates synchronously.
//!
//! Every gesture replaces the transform with a new value. Preview and export
//! render the same crop window from the same transform; only the destination
//! size differs, so what the user framed is what gets exported.

use thiserror::Error;

use crate::config::{CropPreset, PipelineConfig};
use crate::decode::{downscale_to_fit, DecodeError, DecodedImage};
use crate::encode::{encode_jpeg, EncodeError, JpegQuality};
use crate::geometry::{
    max_offset, output_dimensions, viewport_for_aspect, CropRect, CropTransform, NormalizedRect,
    ViewportBounds,
};
use crate::source::{SourceId, SourceImage};
use crate::transform::{orient, render_crop};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    /// Nothing is loaded, or the last load failed.
    #[error("No image is loaded")]
    NotReady,

    #[error("Could not read image: {0}")]
    Decode(#[from] DecodeError),

    #[error("Could not export image: {0}")]
    Encode(#[from] EncodeError),
}

/// What the surface is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceStatus {
    Empty,
    Ready,
    Failed,
}

/// Pointer interaction state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragState {
    Idle,
    Dragging {
        start_x: f64,
        start_y: f64,
        anchor_pan_x: f64,
        anchor_pan_y: f64,
    },
}

/// Settings a surface is created with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceOptions {
    pub aspect: f64,
    pub output_width: u32,
    pub max_zoom: f64,
    pub quality: JpegQuality,
    pub preview: ViewportBounds,
    pub preview_source_max_edge: u32,
}

impl SurfaceOptions {
    pub fn from_config(config: &PipelineConfig, preset: CropPreset) -> Self {
        Self {
            aspect: preset.aspect,
            output_width: preset.output_width,
            max_zoom: config.max_zoom,
            quality: config.crop_quality,
            preview: config.preview,
            preview_source_max_edge: config.preview_source_max_edge,
        }
    }
}

impl Default for SurfaceOptions {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default(), CropPreset::FEED)
    }
}

/// Result of confirming a crop: the unfiltered raster at output size and its
/// JPEG encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct CropOutput {
    pub source_id: SourceId,
    pub transform: CropTransform,
    /// Crop window on the oriented source.
    pub rect: CropRect,
    pub pixels: DecodedImage,
    pub encoded: Vec<u8>,
}

struct LoadedImage {
    source_id: SourceId,
    /// Upright decode of the source.
    original: DecodedImage,
    /// `original` after rotation and flip.
    oriented: DecodedImage,
    /// Downscaled `oriented` the preview renders from.
    proxy: DecodedImage,
}

enum Slot {
    Empty,
    Loaded(Box<LoadedImage>),
    Failed {
        source_id: SourceId,
        error: DecodeError,
    },
}

pub struct CropSurface {
    options: SurfaceOptions,
    slot: Slot,
    drag: DragState,
    transform: CropTransform,
    viewport: (u32, u32),
}

impl CropSurface {
    pub fn new(options: SurfaceOptions) -> Self {
        let transform = CropTransform::new(options.aspect);
        Self {
            viewport: viewport_for_aspect(transform.aspect, options.preview),
            options,
            slot: Slot::Empty,
            drag: DragState::Idle,
            transform,
        }
    }

    /// Decode `source` and make it the current image.
    ///
    /// On failure the surface is left in the `Failed` state and confirm stays
    /// unavailable until another image loads.
    pub fn load(&mut self, source: &SourceImage) -> Result<(), SurfaceError> {
        match source.decode() {
            Ok(image) => {
                self.load_decoded(source.id(), image);
                Ok(())
            }
            Err(error) => {
                log::warn!("source {} failed to decode: {}", source.id(), error);
                self.slot = Slot::Failed {
                    source_id: source.id(),
                    error: error.clone(),
                };
                self.drag = DragState::Idle;
                Err(SurfaceError::Decode(error))
            }
        }
    }

    /// Make an already decoded, upright image the current one.
    pub fn load_decoded(&mut self, source_id: SourceId, image: DecodedImage) {
        if image.is_empty() {
            self.slot = Slot::Failed {
                source_id,
                error: DecodeError::ZeroSized {
                    width: image.width,
                    height: image.height,
                },
            };
            self.drag = DragState::Idle;
            return;
        }

        self.transform = CropTransform::new(self.transform.aspect);
        self.drag = DragState::Idle;
        let oriented = image.clone();
        let proxy = downscale_to_fit(&oriented, self.options.preview_source_max_edge);
        log::debug!(
            "surface loaded {} ({}x{})",
            source_id,
            image.width,
            image.height
        );
        self.slot = Slot::Loaded(Box::new(LoadedImage {
            source_id,
            original: image,
            oriented,
            proxy,
        }));
    }

    /// Drop the current image. Used when the crop surface closes.
    pub fn unload(&mut self) {
        self.slot = Slot::Empty;
        self.drag = DragState::Idle;
        self.transform = self.transform.reset();
    }

    pub fn status(&self) -> SurfaceStatus {
        match self.slot {
            Slot::Empty => SurfaceStatus::Empty,
            Slot::Loaded(_) => SurfaceStatus::Ready,
            Slot::Failed { .. } => SurfaceStatus::Failed,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.slot, Slot::Loaded(_))
    }

    /// Source currently shown (or that failed to load).
    pub fn source_id(&self) -> Option<SourceId> {
        match &self.slot {
            Slot::Empty => None,
            Slot::Loaded(loaded) => Some(loaded.source_id),
            Slot::Failed { source_id, .. } => Some(*source_id),
        }
    }

    pub fn load_error(&self) -> Option<&DecodeError> {
        match &self.slot {
            Slot::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn transform(&self) -> CropTransform {
        self.transform
    }

    pub fn drag_state(&self) -> DragState {
        self.drag
    }

    pub fn options(&self) -> &SurfaceOptions {
        &self.options
    }

    /// Preview canvas size in screen pixels.
    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    /// Dimensions of the source after rotation and flip.
    pub fn oriented_dimensions(&self) -> Option<(u32, u32)> {
        match &self.slot {
            Slot::Loaded(loaded) => Some((loaded.oriented.width, loaded.oriented.height)),
            _ => None,
        }
    }

    fn set_transform(&mut self, transform: CropTransform) -> CropTransform {
        self.transform = transform;
        log::trace!(
            "transform zoom={:.3} pan=({:.3}, {:.3}) rot={} flip={} aspect={:.4}",
            transform.zoom,
            transform.pan_x,
            transform.pan_y,
            transform.rotation_deg,
            transform.flip_horizontal,
            transform.aspect
        );
        transform
    }

    /// Change the target aspect. The preview canvas is resized to match.
    pub fn set_aspect(&mut self, aspect: f64) -> CropTransform {
        let transform = self.transform.with_aspect(aspect);
        self.viewport = viewport_for_aspect(transform.aspect, self.options.preview);
        self.options.aspect = transform.aspect;
        self.set_transform(transform)
    }

    /// Slider input. Clamped to `[1, max_zoom]`.
    pub fn set_zoom(&mut self, zoom: f64) -> CropTransform {
        let zoom = if zoom.is_finite() {
            zoom.min(self.options.max_zoom)
        } else {
            zoom
        };
        let transform = self.transform.with_zoom(zoom);
        self.set_transform(transform)
    }

    /// Back to zoom 1, centered.
    pub fn reset(&mut self) -> CropTransform {
        let transform = self.transform.reset();
        self.set_transform(transform)
    }

    pub fn rotate_clockwise(&mut self) -> CropTransform {
        self.rotate_by(90)
    }

    pub fn rotate_counter_clockwise(&mut self) -> CropTransform {
        self.rotate_by(-90)
    }

    fn rotate_by(&mut self, degrees: i32) -> CropTransform {
        let transform = self
            .transform
            .with_rotation(self.transform.rotation_deg as i32 + degrees)
            .with_pan(0.0, 0.0);
        self.reorient(transform)
    }

    pub fn toggle_flip(&mut self) -> CropTransform {
        let transform = self
            .transform
            .with_flip(!self.transform.flip_horizontal)
            .with_pan(0.0, 0.0);
        self.reorient(transform)
    }

    /// Rebuild the oriented canvas for a new rotation/flip.
    fn reorient(&mut self, transform: CropTransform) -> CropTransform {
        self.drag = DragState::Idle;
        if let Slot::Loaded(loaded) = &mut self.slot {
            loaded.oriented = orient(
                &loaded.original,
                transform.rotation_deg,
                transform.flip_horizontal,
            );
            loaded.proxy = downscale_to_fit(&loaded.oriented, self.options.preview_source_max_edge);
        }
        self.set_transform(transform)
    }

    /// Start a pan drag. Ignored unless an image is loaded.
    pub fn pointer_down(&mut self, x: f64, y: f64) -> bool {
        if !self.is_ready() {
            return false;
        }
        self.drag = DragState::Dragging {
            start_x: x,
            start_y: y,
            anchor_pan_x: self.transform.pan_x,
            anchor_pan_y: self.transform.pan_y,
        };
        true
    }

    /// Continue a drag. The image follows the pointer.
    ///
    /// The legal offset is recomputed from the current zoom on every move.
    /// Returns the new transform, or `None` when no drag is active.
    pub fn pointer_move(&mut self, x: f64, y: f64) -> Option<CropTransform> {
        let DragState::Dragging {
            start_x,
            start_y,
            anchor_pan_x,
            anchor_pan_y,
        } = self.drag
        else {
            return None;
        };
        let (src_w, src_h) = self.oriented_dimensions()?;
        let (view_w, view_h) = self.viewport;
        let (max_x, max_y) = max_offset(src_w, src_h, view_w, view_h, self.transform.zoom);

        let pan_x = if max_x > 0.0 {
            anchor_pan_x - (x - start_x) / max_x
        } else {
            0.0
        };
        let pan_y = if max_y > 0.0 {
            anchor_pan_y - (y - start_y) / max_y
        } else {
            0.0
        };

        let transform = self.transform.with_pan(pan_x, pan_y);
        Some(self.set_transform(transform))
    }

    /// End a drag, keeping the last pan.
    pub fn pointer_up(&mut self) {
        self.drag = DragState::Idle;
    }

    /// The pointer left the canvas; same as releasing it.
    pub fn pointer_leave(&mut self) {
        self.pointer_up();
    }

    fn loaded(&self) -> Result<&LoadedImage, SurfaceError> {
        match &self.slot {
            Slot::Loaded(loaded) => Ok(loaded),
            _ => Err(SurfaceError::NotReady),
        }
    }

    /// Crop window on the oriented full-resolution source.
    pub fn crop_rect(&self) -> Result<CropRect, SurfaceError> {
        let loaded = self.loaded()?;
        Ok(self
            .transform
            .crop_rect(loaded.oriented.width, loaded.oriented.height))
    }

    /// Crop window as fractions of the oriented source.
    pub fn normalized_rect(&self) -> Result<NormalizedRect, SurfaceError> {
        let loaded = self.loaded()?;
        let (w, h) = (loaded.oriented.width, loaded.oriented.height);
        Ok(self.transform.crop_rect(w, h).normalized(w, h))
    }

    /// Dimensions of the downscaled copy the preview draws from.
    pub fn preview_source_dimensions(&self) -> Option<(u32, u32)> {
        match &self.slot {
            Slot::Loaded(loaded) => Some((loaded.proxy.width, loaded.proxy.height)),
            _ => None,
        }
    }

    /// The export crop window mapped onto the downscaled copy.
    ///
    /// The window is computed on the oriented full-resolution source and
    /// scaled, never recomputed from the copy's rounded dimensions.
    pub fn preview_rect(&self) -> Result<CropRect, SurfaceError> {
        let loaded = self.loaded()?;
        let rect = self
            .transform
            .crop_rect(loaded.oriented.width, loaded.oriented.height);
        let scale_x = loaded.proxy.width as f64 / loaded.oriented.width as f64;
        let scale_y = loaded.proxy.height as f64 / loaded.oriented.height as f64;
        Ok(CropRect {
            sx: rect.sx * scale_x,
            sy: rect.sy * scale_y,
            sw: rect.sw * scale_x,
            sh: rect.sh * scale_y,
        })
    }

    /// Render the preview canvas contents.
    pub fn render_preview(&self) -> Result<DecodedImage, SurfaceError> {
        let loaded = self.loaded()?;
        let space = (loaded.oriented.width, loaded.oriented.height);
        let rect = self.transform.crop_rect(space.0, space.1);
        let (view_w, view_h) = self.viewport;
        Ok(render_crop(&loaded.proxy, &rect, space, view_w, view_h))
    }

    /// Export the current framing at output resolution.
    pub fn confirm(&self) -> Result<CropOutput, SurfaceError> {
        let loaded = self.loaded()?;
        let space = (loaded.oriented.width, loaded.oriented.height);
        let rect = self.transform.crop_rect(space.0, space.1);
        let (out_w, out_h) = output_dimensions(self.options.output_width, self.transform.aspect);

        let pixels = render_crop(&loaded.oriented, &rect, space, out_w, out_h);
        let encoded = encode_jpeg(&pixels, self.options.quality)?;

        log::debug!(
            "confirmed crop of {} at {}x{} ({} bytes)",
            loaded.source_id,
            out_w,
            out_h,
            encoded.len()
        );

        Ok(CropOutput {
            source_id: loaded.source_id,
            transform: self.transform,
            rect,
            pixels,
            encoded,
        })
    }
}
