//! Quarter-turn rotation and horizontal mirroring.
//!
//! This is the pre-pass that turns a decoded source into the effective
//! canvas the crop geometry works on. Only exact quarter turns are
//! supported, so every output pixel maps to exactly one source pixel and no
//! area outside the source ever becomes visible.

use image::imageops;

use crate::decode::DecodedImage;
use crate::geometry::normalize_rotation;

/// Rotate clockwise by `rotation_deg` (snapped to quarter turns), then mirror
/// left-to-right when `flip_horizontal` is set.
///
/// # Example
///
/// ```
/// use postframe_core::decode::DecodedImage;
/// use postframe_core::transform::orient;
///
/// let image = DecodedImage::filled(4, 2, [0, 0, 0]);
/// let rotated = orient(&image, 90, false);
/// assert_eq!((rotated.width, rotated.height), (2, 4));
/// ```
pub fn orient(image: &DecodedImage, rotation_deg: u16, flip_horizontal: bool) -> DecodedImage {
    let rotation = normalize_rotation(rotation_deg as i32);
    if rotation == 0 && !flip_horizontal {
        return image.clone();
    }
    let Some(rgb) = image.to_rgb_image() else {
        return image.clone();
    };

    let rotated = match rotation {
        90 => imageops::rotate90(&rgb),
        180 => imageops::rotate180(&rgb),
        270 => imageops::rotate270(&rgb),
        _ => rgb,
    };
    let oriented = if flip_horizontal {
        imageops::flip_horizontal(&rotated)
    } else {
        rotated
    };

    DecodedImage::from_rgb_image(oriented)
}
