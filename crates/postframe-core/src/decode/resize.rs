//! Downscaled working copies for interactive preview.
//!
//! Camera photos are often 12+ megapixels while the crop surface draws into
//! a canvas a few hundred pixels wide. The surface renders its preview from
//! a proxy produced here and keeps the full-resolution source for export.
//! Crop windows are resolution independent, so both produce the same
//! framing.

use super::DecodedImage;

/// Shrink an image so its longest edge is at most `max_edge`.
///
/// Aspect ratio is preserved. Images that already fit are returned as a
/// clone. A `max_edge` of zero is treated as "no limit".
pub fn downscale_to_fit(image: &DecodedImage, max_edge: u32) -> DecodedImage {
    if max_edge == 0 || (image.width <= max_edge && image.height <= max_edge) {
        return image.clone();
    }

    let (width, height) = calculate_fit_dimensions(image.width, image.height, max_edge);
    match image.to_rgb_image() {
        Some(rgb) => DecodedImage::from_rgb_image(image::imageops::resize(
            &rgb,
            width,
            height,
            image::imageops::FilterType::Triangle,
        )),
        None => image.clone(),
    }
}

/// Calculate dimensions to fit within max_edge while preserving aspect ratio.
fn calculate_fit_dimensions(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (0, 0);
    }

    let ratio = width as f64 / height as f64;

    if width >= height {
        let new_height = (max_edge as f64 / ratio).round() as u32;
        (max_edge, new_height.max(1))
    } else {
        let new_width = (max_edge as f64 * ratio).round() as u32;
        (new_width.max(1), max_edge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landscape_proxy() {
        let img = DecodedImage::filled(600, 400, [1, 2, 3]);
        let proxy = downscale_to_fit(&img, 300);
        assert_eq!((proxy.width, proxy.height), (300, 200));
        assert_eq!(proxy.pixels.len(), 300 * 200 * 3);
    }

    #[test]
    fn test_portrait_proxy() {
        let img = DecodedImage::filled(400, 600, [1, 2, 3]);
        let proxy = downscale_to_fit(&img, 300);
        assert_eq!((proxy.width, proxy.height), (200, 300));
    }

    #[test]
    fn test_small_image_untouched() {
        let img = DecodedImage::filled(40, 30, [9, 9, 9]);
        assert_eq!(downscale_to_fit(&img, 300), img);
        assert_eq!(downscale_to_fit(&img, 0), img);
    }

    #[test]
    fn test_extreme_ratio_keeps_one_pixel() {
        assert_eq!(calculate_fit_dimensions(10_000, 1, 100), (100, 1));
        assert_eq!(calculate_fit_dimensions(0, 10, 100), (0, 0));
    }
}
