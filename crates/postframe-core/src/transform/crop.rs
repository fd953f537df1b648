//! Rendering a crop window to a destination raster.
//!
//! The crop window comes from [`crate::geometry`] in fractional source
//! pixels. Rendering uses inverse mapping: every destination pixel center is
//! mapped back into the window and sampled bilinearly. Sample positions are
//! clamped to the source edges, so nothing outside the source is ever read
//! and there is no border fill.
//!
//! Preview and export call the same function with the same window; only
//! the destination size differs.

use crate::decode::DecodedImage;
use crate::geometry::CropRect;

/// Render `rect` of `image` into an `out_width x out_height` raster.
///
/// `rect` may be expressed against a different-resolution copy of the same
/// image as long as `rect_space` gives that copy's dimensions; it is scaled
/// onto `image` before sampling. Pass the image's own dimensions otherwise.
///
/// # Example
///
/// ```
/// use postframe_core::decode::DecodedImage;
/// use postframe_core::geometry::compute_crop_rect;
/// use postframe_core::transform::render_crop;
///
/// let image = DecodedImage::filled(100, 100, [10, 20, 30]);
/// let rect = compute_crop_rect(100, 100, 2.0, 0.0, 0.0, 1.0);
/// let out = render_crop(&image, &rect, (100, 100), 40, 40);
/// assert_eq!((out.width, out.height), (40, 40));
/// ```
pub fn render_crop(
    image: &DecodedImage,
    rect: &CropRect,
    rect_space: (u32, u32),
    out_width: u32,
    out_height: u32,
) -> DecodedImage {
    let out_width = out_width.max(1);
    let out_height = out_height.max(1);
    let mut output = vec![0u8; (out_width as usize) * (out_height as usize) * 3];

    if image.is_empty() {
        return DecodedImage::new(out_width, out_height, output);
    }

    let (space_w, space_h) = (rect_space.0.max(1) as f64, rect_space.1.max(1) as f64);
    let scale_x = image.width as f64 / space_w;
    let scale_y = image.height as f64 / space_h;

    let sx = rect.sx * scale_x;
    let sy = rect.sy * scale_y;
    let step_x = rect.sw * scale_x / out_width as f64;
    let step_y = rect.sh * scale_y / out_height as f64;

    for dst_y in 0..out_height {
        // Pixel centers sit at +0.5; shift back to sample-grid coordinates
        let src_y = sy + (dst_y as f64 + 0.5) * step_y - 0.5;
        let row = (dst_y as usize) * (out_width as usize) * 3;

        for dst_x in 0..out_width {
            let src_x = sx + (dst_x as f64 + 0.5) * step_x - 0.5;
            let pixel = sample_bilinear(image, src_x, src_y);

            let idx = row + (dst_x as usize) * 3;
            output[idx..idx + 3].copy_from_slice(&pixel);
        }
    }

    DecodedImage::new(out_width, out_height, output)
}

#[inline]
fn get_pixel_f64(image: &DecodedImage, px: usize, py: usize) -> [f64; 3] {
    let idx = (py * image.width as usize + px) * 3;
    [
        image.pixels[idx] as f64,
        image.pixels[idx + 1] as f64,
        image.pixels[idx + 2] as f64,
    ]
}

/// Bilinear sample with coordinates clamped to the outermost pixel centers.
fn sample_bilinear(image: &DecodedImage, x: f64, y: f64) -> [u8; 3] {
    let max_x = (image.width - 1) as f64;
    let max_y = (image.height - 1) as f64;
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);

    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(image.width as usize - 1);
    let y1 = (y0 + 1).min(image.height as usize - 1);

    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let p00 = get_pixel_f64(image, x0, y0);
    let p10 = get_pixel_f64(image, x1, y0);
    let p01 = get_pixel_f64(image, x0, y1);
    let p11 = get_pixel_f64(image, x1, y1);

    let mut result = [0u8; 3];
    for i in 0..3 {
        let v = p00[i] * (1.0 - fx) * (1.0 - fy)
            + p10[i] * fx * (1.0 - fy)
            + p01[i] * (1.0 - fx) * fy
            + p11[i] * fx * fy;
        result[i] = v.round().clamp(0.0, 255.0) as u8;
    }
    result
}
