//! Crop geometry: crop windows, cover-fit scales and legal pan offsets.
//!
//! Everything here is pure. A [`CropTransform`] is stored in normalized
//! units (zoom factor, pan as a fraction of the maximum legal translation),
//! so the same transform can be replayed at preview resolution and at export
//! resolution and select the same region of the source.
//!
//! # Coordinate System
//!
//! - Source rectangles are in source pixels, origin top-left
//! - `pan_x = 1` moves the crop window to the right edge, `pan_y = 1` to
//!   the bottom edge
//! - Rotation is clockwise in quarter turns and is applied to the source
//!   before any of this math runs

use serde::{Deserialize, Serialize};

/// Aspect ratio (width / height) required for stories.
pub const STORY_ASPECT: f64 = 9.0 / 16.0;

/// Two aspects closer than this are treated as equal.
pub const ASPECT_TOLERANCE: f64 = 1e-3;

/// Whether two aspect ratios describe the same frame shape.
pub fn aspects_match(a: f64, b: f64) -> bool {
    (a - b).abs() < ASPECT_TOLERANCE
}

/// Clamp a zoom factor to `>= 1`. Non-finite values reset to 1.
pub fn clamp_zoom(zoom: f64) -> f64 {
    if zoom.is_finite() {
        zoom.max(1.0)
    } else {
        1.0
    }
}

/// Clamp a normalized pan component into `[-1, 1]`. Out-of-range values
/// (infinities included) are clamped, never wrapped; NaN resets to 0.
pub fn clamp_pan(pan: f64) -> f64 {
    if pan.is_nan() {
        0.0
    } else {
        pan.clamp(-1.0, 1.0)
    }
}

/// Normalize a rotation to `[0, 360)` and snap it to the nearest quarter turn.
pub fn normalize_rotation(degrees: i32) -> u16 {
    let wrapped = degrees.rem_euclid(360);
    (((wrapped + 45) / 90 % 4) * 90) as u16
}

fn sanitize_aspect(aspect: f64) -> f64 {
    if aspect.is_finite() && aspect > 0.0 {
        aspect
    } else {
        1.0
    }
}

/// Crop/zoom/pan/rotate/flip state for one image.
///
/// This is a value type: gestures produce a new transform instead of
/// mutating a shared one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropTransform {
    /// Zoom factor (>= 1). 2 halves the side of the crop window.
    pub zoom: f64,
    /// Horizontal pan as a fraction of the maximum legal offset (-1 to 1).
    pub pan_x: f64,
    /// Vertical pan as a fraction of the maximum legal offset (-1 to 1).
    pub pan_y: f64,
    /// Clockwise rotation in degrees: 0, 90, 180 or 270.
    pub rotation_deg: u16,
    /// Mirror the rotated source left-to-right.
    pub flip_horizontal: bool,
    /// Target aspect ratio (width / height).
    pub aspect: f64,
}

impl Default for CropTransform {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl CropTransform {
    /// Centered, unzoomed transform for the given target aspect.
    pub fn new(aspect: f64) -> Self {
        Self {
            zoom: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
            rotation_deg: 0,
            flip_horizontal: false,
            aspect: sanitize_aspect(aspect),
        }
    }

    pub fn with_zoom(self, zoom: f64) -> Self {
        Self {
            zoom: clamp_zoom(zoom),
            ..self
        }
    }

    pub fn with_pan(self, pan_x: f64, pan_y: f64) -> Self {
        Self {
            pan_x: clamp_pan(pan_x),
            pan_y: clamp_pan(pan_y),
            ..self
        }
    }

    pub fn with_rotation(self, degrees: i32) -> Self {
        Self {
            rotation_deg: normalize_rotation(degrees),
            ..self
        }
    }

    pub fn with_flip(self, flip_horizontal: bool) -> Self {
        Self {
            flip_horizontal,
            ..self
        }
    }

    pub fn with_aspect(self, aspect: f64) -> Self {
        Self {
            aspect: sanitize_aspect(aspect),
            ..self
        }
    }

    /// Back to zoom 1 and a centered window. Rotation, flip and aspect stay.
    pub fn reset(self) -> Self {
        Self {
            zoom: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
            ..self
        }
    }

    /// Source dimensions after the rotation pre-pass.
    pub fn oriented_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        oriented_dimensions(width, height, self.rotation_deg)
    }

    /// Crop window on an (already oriented) source of the given size.
    pub fn crop_rect(&self, source_width: u32, source_height: u32) -> CropRect {
        compute_crop_rect(
            source_width,
            source_height,
            self.zoom,
            self.pan_x,
            self.pan_y,
            self.aspect,
        )
    }
}

/// A crop window in source pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CropRect {
    pub sx: f64,
    pub sy: f64,
    pub sw: f64,
    pub sh: f64,
}

impl CropRect {
    /// The same window as fractions of the source dimensions.
    pub fn normalized(&self, source_width: u32, source_height: u32) -> NormalizedRect {
        let (w, h) = (source_width as f64, source_height as f64);
        if w <= 0.0 || h <= 0.0 {
            return NormalizedRect::default();
        }
        NormalizedRect {
            left: self.sx / w,
            top: self.sy / h,
            width: self.sw / w,
            height: self.sh / h,
        }
    }

    /// Whether the window lies inside a `width x height` source.
    pub fn is_within(&self, width: u32, height: u32, epsilon: f64) -> bool {
        self.sx >= -epsilon
            && self.sy >= -epsilon
            && self.sx + self.sw <= width as f64 + epsilon
            && self.sy + self.sh <= height as f64 + epsilon
    }
}

/// A crop window relative to the source (0.0 to 1.0 on each axis).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Compute the crop window for a source image.
///
/// The window is the largest rectangle of `aspect` that fits the source,
/// shrunk by `zoom`, then moved from the center by `pan` times the maximum
/// offset that keeps it inside the source. `zoom < 1` is clamped to 1 and
/// pan components are clamped into `[-1, 1]` before use.
///
/// # Example
///
/// ```
/// use postframe_core::geometry::compute_crop_rect;
///
/// let rect = compute_crop_rect(1000, 1000, 2.0, 1.0, 0.0, 1.0);
/// assert_eq!((rect.sx, rect.sy, rect.sw, rect.sh), (500.0, 250.0, 500.0, 500.0));
/// ```
pub fn compute_crop_rect(
    source_width: u32,
    source_height: u32,
    zoom: f64,
    pan_x: f64,
    pan_y: f64,
    aspect: f64,
) -> CropRect {
    if source_width == 0 || source_height == 0 {
        return CropRect::default();
    }

    let (w, h) = (source_width as f64, source_height as f64);
    let aspect = sanitize_aspect(aspect);
    let zoom = clamp_zoom(zoom);

    let (base_w, base_h) = if w / h > aspect {
        (h * aspect, h)
    } else {
        (w, w / aspect)
    };

    let sw = (base_w / zoom).min(w);
    let sh = (base_h / zoom).min(h);

    let max_x = ((w - sw) / 2.0).max(0.0);
    let max_y = ((h - sh) / 2.0).max(0.0);

    let sx = (max_x + clamp_pan(pan_x) * max_x).clamp(0.0, w - sw);
    let sy = (max_y + clamp_pan(pan_y) * max_y).clamp(0.0, h - sh);

    CropRect { sx, sy, sw, sh }
}

/// Cover-fit scale: the smallest factor at which the source covers the
/// destination on both axes. Never letterboxes.
pub fn compute_base_scale(src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> f64 {
    if src_w == 0 || src_h == 0 {
        return 1.0;
    }
    (dst_w as f64 / src_w as f64).max(dst_h as f64 / src_h as f64)
}

/// Maximum translation (in destination pixels) of a source drawn cover-fit
/// and zoomed into a destination before an edge would become visible.
pub fn max_offset(src_w: u32, src_h: u32, dst_w: u32, dst_h: u32, zoom: f64) -> (f64, f64) {
    let scale = compute_base_scale(src_w, src_h, dst_w, dst_h) * clamp_zoom(zoom);
    (
        ((src_w as f64 * scale - dst_w as f64) / 2.0).max(0.0),
        ((src_h as f64 * scale - dst_h as f64) / 2.0).max(0.0),
    )
}

/// Dimensions after a rotation; quarter and three-quarter turns swap them.
pub fn oriented_dimensions(width: u32, height: u32, rotation_deg: u16) -> (u32, u32) {
    if rotation_deg % 180 == 90 {
        (height, width)
    } else {
        (width, height)
    }
}

/// Export dimensions for an explicit output width and aspect.
pub fn output_dimensions(output_width: u32, aspect: f64) -> (u32, u32) {
    let width = output_width.max(1);
    let height = (width as f64 / sanitize_aspect(aspect)).round().max(1.0) as u32;
    (width, height)
}

/// Size limits for the interactive preview canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportBounds {
    pub max_width: u32,
    pub max_height: u32,
    /// Neither edge is allowed below this.
    pub min_edge: u32,
}

impl Default for ViewportBounds {
    fn default() -> Self {
        Self {
            max_width: 560,
            max_height: 640,
            min_edge: 260,
        }
    }
}

/// Preview canvas size for an aspect: as wide as allowed, then limited by
/// height, then scaled up if an edge falls below the minimum.
///
/// The canvas always keeps `aspect` and never exceeds the maximum bounds;
/// when the minimum edge and the bounds disagree the bounds win.
pub fn viewport_for_aspect(aspect: f64, bounds: ViewportBounds) -> (u32, u32) {
    let aspect = sanitize_aspect(aspect);
    let max_width = bounds.max_width.max(1) as f64;
    let max_height = if bounds.max_height > 0 {
        bounds.max_height as f64
    } else {
        f64::INFINITY
    };

    let mut width = max_width;
    let mut height = width / aspect;
    if height > max_height {
        height = max_height;
        width = height * aspect;
    }

    let shortest = width.min(height);
    if shortest < bounds.min_edge as f64 && shortest > 0.0 {
        let grow = bounds.min_edge as f64 / shortest;
        width *= grow;
        height *= grow;
    }

    let shrink = (max_width / width).min(max_height / height).min(1.0);
    width *= shrink;
    height *= shrink;

    (
        (width.round() as u32).clamp(1, max_width as u32),
        (height.round() as u32).max(1).min(bounds.max_height.max(1)),
    )
}


// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn dimensions_strategy() -> impl Strategy<Value = (u32, u32)> {
        (1u32..=8000, 1u32..=8000)
    }

    fn transform_strategy() -> impl Strategy<Value = (f64, f64, f64, f64)> {
        (
            1.0f64..=5.0,  // zoom
            -1.0f64..=1.0, // pan x
            -1.0f64..=1.0, // pan y
            0.2f64..=5.0,  // aspect
        )
    }

    proptest! {
        /// Property: the crop window never leaves the source.
        #[test]
        fn prop_rect_contained(
            (w, h) in dimensions_strategy(),
            (zoom, px, py, aspect) in transform_strategy(),
        ) {
            let rect = compute_crop_rect(w, h, zoom, px, py, aspect);
            prop_assert!(rect.sx >= 0.0);
            prop_assert!(rect.sy >= 0.0);
            prop_assert!(rect.sx + rect.sw <= w as f64 + 1e-9);
            prop_assert!(rect.sy + rect.sh <= h as f64 + 1e-9);
            prop_assert!(rect.sw > 0.0 && rect.sh > 0.0);
        }

        /// Property: the window has the requested aspect.
        #[test]
        fn prop_rect_has_target_aspect(
            (w, h) in dimensions_strategy(),
            (zoom, px, py, aspect) in transform_strategy(),
        ) {
            let rect = compute_crop_rect(w, h, zoom, px, py, aspect);
            let got = rect.sw / rect.sh;
            prop_assert!((got - aspect).abs() / aspect < 1e-9);
        }

        /// Property: identical inputs give bit-identical windows.
        #[test]
        fn prop_rect_deterministic(
            (w, h) in dimensions_strategy(),
            (zoom, px, py, aspect) in transform_strategy(),
        ) {
            let a = compute_crop_rect(w, h, zoom, px, py, aspect);
            let b = compute_crop_rect(w, h, zoom, px, py, aspect);
            prop_assert_eq!(a.sx.to_bits(), b.sx.to_bits());
            prop_assert_eq!(a.sy.to_bits(), b.sy.to_bits());
            prop_assert_eq!(a.sw.to_bits(), b.sw.to_bits());
            prop_assert_eq!(a.sh.to_bits(), b.sh.to_bits());
        }

        /// Property: the normalized window is the same whether the source is
        /// the full-resolution image or a scaled proxy of it.
        #[test]
        fn prop_normalized_rect_scale_invariant(
            (w, h) in (10u32..=4000, 10u32..=4000),
            factor in 1u32..=8,
            (zoom, px, py, aspect) in transform_strategy(),
        ) {
            let full = compute_crop_rect(w * factor, h * factor, zoom, px, py, aspect)
                .normalized(w * factor, h * factor);
            let proxy = compute_crop_rect(w, h, zoom, px, py, aspect).normalized(w, h);
            prop_assert!((full.left - proxy.left).abs() < 1e-9);
            prop_assert!((full.top - proxy.top).abs() < 1e-9);
            prop_assert!((full.width - proxy.width).abs() < 1e-9);
            prop_assert!((full.height - proxy.height).abs() < 1e-9);
        }

        /// Property: zooming in never grows the window.
        #[test]
        fn prop_zoom_shrinks_window(
            (w, h) in dimensions_strategy(),
            zoom in 1.0f64..=4.0,
            extra in 0.0f64..=2.0,
            aspect in 0.2f64..=5.0,
        ) {
            let a = compute_crop_rect(w, h, zoom, 0.0, 0.0, aspect);
            let b = compute_crop_rect(w, h, zoom + extra, 0.0, 0.0, aspect);
            prop_assert!(b.sw <= a.sw + 1e-9);
            prop_assert!(b.sh <= a.sh + 1e-9);
        }
    }
}
