//! Tunable policy for cropping and publishing.
//!
//! All fields have production defaults and deserialize with `#[serde(default)]`,
//! so a host can pass a partial object (for example from JavaScript) and
//! override only what it needs.

use serde::{Deserialize, Serialize};

use crate::encode::JpegQuality;
use crate::geometry::{ViewportBounds, STORY_ASPECT};

/// Target frame shape and export width for one use case.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropPreset {
    /// Width / height.
    pub aspect: f64,
    /// Export width in pixels; height follows from the aspect.
    pub output_width: u32,
}

impl CropPreset {
    pub const fn new(aspect: f64, output_width: u32) -> Self {
        Self {
            aspect,
            output_width,
        }
    }

    /// Square profile picture.
    pub const AVATAR: Self = Self::new(1.0, 600);
    /// Default feed frame.
    pub const FEED: Self = Self::new(4.0 / 3.0, 1200);
    /// Full-screen vertical story.
    pub const STORY: Self = Self::new(STORY_ASPECT, 1080);
}

/// Configuration for the crop surface and publish pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Most images one post may carry. Extra selections are dropped with a
    /// warning.
    pub max_images: usize,
    /// Upper bound of the zoom slider.
    pub max_zoom: f64,
    /// Quality of the JPEG produced when a crop is confirmed.
    pub crop_quality: JpegQuality,
    /// Quality of the JPEG uploaded at publish time.
    pub publish_quality: JpegQuality,
    pub feed_preset: CropPreset,
    pub story_preset: CropPreset,
    pub avatar_preset: CropPreset,
    /// Aspects offered for feed posts.
    pub feed_aspect_options: Vec<f64>,
    /// Preview canvas limits.
    pub preview: ViewportBounds,
    /// Longest edge of the downscaled copy the preview renders from.
    pub preview_source_max_edge: u32,
    /// How long a story stays visible.
    pub story_ttl_hours: u32,
    pub feed_bucket: String,
    pub story_bucket: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_images: 7,
            max_zoom: 3.0,
            crop_quality: JpegQuality::new(0.92),
            publish_quality: JpegQuality::new(0.8),
            feed_preset: CropPreset::FEED,
            story_preset: CropPreset::STORY,
            avatar_preset: CropPreset::AVATAR,
            feed_aspect_options: vec![4.0 / 3.0, 1.0, 4.0 / 5.0],
            preview: ViewportBounds::default(),
            preview_source_max_edge: 1600,
            story_ttl_hours: 24,
            feed_bucket: "post-images".to_string(),
            story_bucket: "stories".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Copy with out-of-range values pulled back to something usable.
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();

        self.max_images = self.max_images.max(1);
        if !self.max_zoom.is_finite() || self.max_zoom < 1.0 {
            self.max_zoom = defaults.max_zoom;
        }
        for preset in [
            &mut self.feed_preset,
            &mut self.story_preset,
            &mut self.avatar_preset,
        ] {
            if !preset.aspect.is_finite() || preset.aspect <= 0.0 {
                preset.aspect = 1.0;
            }
            preset.output_width = preset.output_width.max(1);
        }
        self.feed_aspect_options
            .retain(|aspect| aspect.is_finite() && *aspect > 0.0);
        if self.feed_aspect_options.is_empty() {
            self.feed_aspect_options = vec![self.feed_preset.aspect];
        }
        self.story_ttl_hours = self.story_ttl_hours.max(1);
        if self.feed_bucket.trim().is_empty() {
            self.feed_bucket = defaults.feed_bucket;
        }
        if self.story_bucket.trim().is_empty() {
            self.story_bucket = defaults.story_bucket;
        }
        self
    }
}
