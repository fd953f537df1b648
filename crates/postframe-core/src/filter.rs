//! Named color filters applied to a whole batch at publish time.
//!
//! Each filter is a fixed composite of CSS-style filter stages. The stages
//! run in this order, clamping to the displayable range after each one:
//! 1. Brightness
//! 2. Contrast
//! 3. Saturation
//! 4. Hue rotation
//! 5. Sepia
//! 6. Grayscale
//!
//! The matrices are the ones CSS filter effects specify, so the overlay the
//! UI shows with [`FilterSpec::css`] matches the exported pixels closely.
//! The filter is never baked in at crop time; export always starts from the
//! unfiltered cropped raster.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decode::DecodedImage;

/// ITU-R BT.709 luma weights used by the grayscale stage.
const LUMA_R: f32 = 0.2126;
const LUMA_G: f32 = 0.7152;
const LUMA_B: f32 = 0.0722;

/// Rounded luma weights the saturation and hue matrices are built from.
const SAT_R: f32 = 0.213;
const SAT_G: f32 = 0.715;
const SAT_B: f32 = 0.072;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown filter: {0}")]
pub struct UnknownFilter(pub String);

/// The closed set of filters a post or story can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterSpec {
    #[default]
    None,
    Warm,
    Cool,
    Mono,
    Vintage,
}

/// Stage parameters for one filter. Identity values are 1.0 for
/// brightness/contrast/saturation and 0.0 for the rest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FilterCoefficients {
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub hue_rotate_deg: f32,
    pub sepia: f32,
    pub grayscale: f32,
}

impl FilterCoefficients {
    pub const IDENTITY: Self = Self {
        brightness: 1.0,
        contrast: 1.0,
        saturation: 1.0,
        hue_rotate_deg: 0.0,
        sepia: 0.0,
        grayscale: 0.0,
    };

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

impl FilterSpec {
    pub const ALL: [FilterSpec; 5] = [
        FilterSpec::None,
        FilterSpec::Warm,
        FilterSpec::Cool,
        FilterSpec::Mono,
        FilterSpec::Vintage,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FilterSpec::None => "none",
            FilterSpec::Warm => "warm",
            FilterSpec::Cool => "cool",
            FilterSpec::Mono => "mono",
            FilterSpec::Vintage => "vintage",
        }
    }

    pub fn coefficients(self) -> FilterCoefficients {
        let id = FilterCoefficients::IDENTITY;
        match self {
            FilterSpec::None => id,
            FilterSpec::Warm => FilterCoefficients {
                contrast: 1.05,
                saturation: 1.15,
                hue_rotate_deg: -8.0,
                sepia: 0.15,
                ..id
            },
            FilterSpec::Cool => FilterCoefficients {
                brightness: 1.02,
                contrast: 1.05,
                saturation: 0.95,
                hue_rotate_deg: 12.0,
                ..id
            },
            FilterSpec::Mono => FilterCoefficients {
                contrast: 1.10,
                grayscale: 1.0,
                ..id
            },
            FilterSpec::Vintage => FilterCoefficients {
                brightness: 1.05,
                contrast: 0.90,
                saturation: 0.85,
                sepia: 0.35,
                ..id
            },
        }
    }

    /// CSS `filter` value for the live overlay in the review screen.
    pub fn css(self) -> String {
        let c = self.coefficients();
        if c.is_identity() {
            return "none".to_string();
        }
        let mut parts = Vec::new();
        if c.brightness != 1.0 {
            parts.push(format!("brightness({})", c.brightness));
        }
        if c.contrast != 1.0 {
            parts.push(format!("contrast({})", c.contrast));
        }
        if c.saturation != 1.0 {
            parts.push(format!("saturate({})", c.saturation));
        }
        if c.hue_rotate_deg != 0.0 {
            parts.push(format!("hue-rotate({}deg)", c.hue_rotate_deg));
        }
        if c.sepia != 0.0 {
            parts.push(format!("sepia({})", c.sepia));
        }
        if c.grayscale != 0.0 {
            parts.push(format!("grayscale({})", c.grayscale));
        }
        parts.join(" ")
    }
}

impl fmt::Display for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FilterSpec {
    type Err = UnknownFilter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        if wanted.is_empty() {
            return Ok(FilterSpec::None);
        }
        FilterSpec::ALL
            .into_iter()
            .find(|f| f.name() == wanted)
            .ok_or_else(|| UnknownFilter(s.to_string()))
    }
}

type Matrix = [[f32; 3]; 3];

fn saturation_matrix(s: f32) -> Matrix {
    [
        [SAT_R + (1.0 - SAT_R) * s, SAT_G - SAT_G * s, SAT_B - SAT_B * s],
        [SAT_R - SAT_R * s, SAT_G + (1.0 - SAT_G) * s, SAT_B - SAT_B * s],
        [SAT_R - SAT_R * s, SAT_G - SAT_G * s, SAT_B + (1.0 - SAT_B) * s],
    ]
}

fn hue_rotate_matrix(degrees: f32) -> Matrix {
    let (sin, cos) = degrees.to_radians().sin_cos();
    [
        [
            SAT_R + cos * (1.0 - SAT_R) - sin * SAT_R,
            SAT_G - cos * SAT_G - sin * SAT_G,
            SAT_B - cos * SAT_B + sin * (1.0 - SAT_B),
        ],
        [
            SAT_R - cos * SAT_R + sin * 0.143,
            SAT_G + cos * (1.0 - SAT_G) + sin * 0.140,
            SAT_B - cos * SAT_B - sin * 0.283,
        ],
        [
            SAT_R - cos * SAT_R - sin * (1.0 - SAT_R),
            SAT_G - cos * SAT_G + sin * SAT_G,
            SAT_B + cos * (1.0 - SAT_B) + sin * SAT_B,
        ],
    ]
}

fn sepia_matrix(amount: f32) -> Matrix {
    let k = 1.0 - amount.clamp(0.0, 1.0);
    [
        [0.393 + 0.607 * k, 0.769 - 0.769 * k, 0.189 - 0.189 * k],
        [0.349 - 0.349 * k, 0.686 + 0.314 * k, 0.168 - 0.168 * k],
        [0.272 - 0.272 * k, 0.534 - 0.534 * k, 0.131 + 0.869 * k],
    ]
}

fn grayscale_matrix(amount: f32) -> Matrix {
    let k = 1.0 - amount.clamp(0.0, 1.0);
    [
        [LUMA_R + (1.0 - LUMA_R) * k, LUMA_G - LUMA_G * k, LUMA_B - LUMA_B * k],
        [LUMA_R - LUMA_R * k, LUMA_G + (1.0 - LUMA_G) * k, LUMA_B - LUMA_B * k],
        [LUMA_R - LUMA_R * k, LUMA_G - LUMA_G * k, LUMA_B + (1.0 - LUMA_B) * k],
    ]
}

#[inline]
fn apply_matrix(m: &Matrix, (r, g, b): (f32, f32, f32)) -> (f32, f32, f32) {
    (
        (m[0][0] * r + m[0][1] * g + m[0][2] * b).clamp(0.0, 1.0),
        (m[1][0] * r + m[1][1] * g + m[1][2] * b).clamp(0.0, 1.0),
        (m[2][0] * r + m[2][1] * g + m[2][2] * b).clamp(0.0, 1.0),
    )
}

/// Stages of one filter with their matrices precomputed.
struct CompiledFilter {
    brightness: f32,
    contrast: f32,
    matrices: Vec<Matrix>,
}

impl CompiledFilter {
    fn new(c: FilterCoefficients) -> Self {
        let mut matrices = Vec::new();
        if c.saturation != 1.0 {
            matrices.push(saturation_matrix(c.saturation));
        }
        if c.hue_rotate_deg != 0.0 {
            matrices.push(hue_rotate_matrix(c.hue_rotate_deg));
        }
        if c.sepia != 0.0 {
            matrices.push(sepia_matrix(c.sepia));
        }
        if c.grayscale != 0.0 {
            matrices.push(grayscale_matrix(c.grayscale));
        }
        Self {
            brightness: c.brightness,
            contrast: c.contrast,
            matrices,
        }
    }

    #[inline]
    fn apply(&self, rgb: (f32, f32, f32)) -> (f32, f32, f32) {
        let (mut r, mut g, mut b) = rgb;

        if self.brightness != 1.0 {
            r = (r * self.brightness).clamp(0.0, 1.0);
            g = (g * self.brightness).clamp(0.0, 1.0);
            b = (b * self.brightness).clamp(0.0, 1.0);
        }
        if self.contrast != 1.0 {
            r = ((r - 0.5) * self.contrast + 0.5).clamp(0.0, 1.0);
            g = ((g - 0.5) * self.contrast + 0.5).clamp(0.0, 1.0);
            b = ((b - 0.5) * self.contrast + 0.5).clamp(0.0, 1.0);
        }

        self.matrices
            .iter()
            .fold((r, g, b), |rgb, m| apply_matrix(m, rgb))
    }
}

/// Apply a filter to RGB pixel data in place.
pub fn apply_filter_in_place(pixels: &mut [u8], filter: FilterSpec) {
    let coefficients = filter.coefficients();
    if coefficients.is_identity() {
        return;
    }

    let compiled = CompiledFilter::new(coefficients);
    for chunk in pixels.chunks_exact_mut(3) {
        let (r, g, b) = compiled.apply((
            chunk[0] as f32 / 255.0,
            chunk[1] as f32 / 255.0,
            chunk[2] as f32 / 255.0,
        ));
        chunk[0] = (r * 255.0).round() as u8;
        chunk[1] = (g * 255.0).round() as u8;
        chunk[2] = (b * 255.0).round() as u8;
    }
}

/// Return a filtered copy of `image`. The input is left untouched, so the
/// same cropped raster can be re-exported with a different filter.
pub fn apply_filter(image: &DecodedImage, filter: FilterSpec) -> DecodedImage {
    let mut out = image.clone();
    apply_filter_in_place(&mut out.pixels, filter);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_image() -> DecodedImage {
        let mut pixels = Vec::new();
        for v in [0u8, 40, 90, 128, 170, 220, 255] {
            pixels.extend_from_slice(&[v, 255 - v, v / 2]);
        }
        DecodedImage::new(7, 1, pixels)
    }

    #[test]
    fn test_none_is_identity() {
        let img = sample_image();
        assert_eq!(apply_filter(&img, FilterSpec::None), img);
    }

    #[test]
    fn test_every_named_filter_changes_pixels() {
        let img = sample_image();
        for filter in FilterSpec::ALL.into_iter().skip(1) {
            assert_ne!(apply_filter(&img, filter), img, "{filter} had no effect");
        }
    }

    #[test]
    fn test_mono_is_gray() {
        let out = apply_filter(&sample_image(), FilterSpec::Mono);
        for px in out.pixels.chunks_exact(3) {
            assert_eq!(px[0], px[1]);
            assert_eq!(px[1], px[2]);
        }
    }

    #[test]
    fn test_warm_and_vintage_tint_gray_toward_red() {
        let gray = DecodedImage::filled(1, 1, [128, 128, 128]);
        for filter in [FilterSpec::Warm, FilterSpec::Vintage] {
            let px = apply_filter(&gray, filter).pixel(0, 0).unwrap();
            assert!(px[0] > px[2], "{filter}: {px:?}");
        }
    }

    #[test]
    fn test_filter_is_deterministic_and_non_mutating() {
        let img = sample_image();
        let before = img.clone();
        let a = apply_filter(&img, FilterSpec::Vintage);
        let b = apply_filter(&img, FilterSpec::Vintage);
        assert_eq!(a, b);
        assert_eq!(img, before);
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("warm".parse::<FilterSpec>().unwrap(), FilterSpec::Warm);
        assert_eq!(" MONO ".parse::<FilterSpec>().unwrap(), FilterSpec::Mono);
        assert_eq!("".parse::<FilterSpec>().unwrap(), FilterSpec::None);
        assert_eq!(
            "sparkle".parse::<FilterSpec>(),
            Err(UnknownFilter("sparkle".to_string()))
        );
        for filter in FilterSpec::ALL {
            assert_eq!(filter.to_string().parse::<FilterSpec>().unwrap(), filter);
        }
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&FilterSpec::Vintage).unwrap();
        assert_eq!(json, "\"vintage\"");
        let parsed: FilterSpec = serde_json::from_str("\"cool\"").unwrap();
        assert_eq!(parsed, FilterSpec::Cool);
    }

    #[test]
    fn test_css_overlay() {
        assert_eq!(FilterSpec::None.css(), "none");
        assert_eq!(FilterSpec::Mono.css(), "contrast(1.1) grayscale(1)");
        assert!(FilterSpec::Warm.css().contains("hue-rotate(-8deg)"));
    }

    #[test]
    fn test_identity_matrices() {
        let rgb = (0.2, 0.5, 0.9);
        for m in [saturation_matrix(1.0), sepia_matrix(0.0), grayscale_matrix(0.0)] {
            let (r, g, b) = apply_matrix(&m, rgb);
            assert!((r - 0.2).abs() < 1e-3);
            assert!((g - 0.5).abs() < 1e-3);
            assert!((b - 0.9).abs() < 1e-3);
        }
    }
}
