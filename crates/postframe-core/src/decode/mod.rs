//! Decoding of user-selected images.
//!
//! This module provides functionality for:
//! - Decoding JPEG and PNG selections with EXIF orientation applied
//! - Reading upright dimensions from the header alone
//! - Building downscaled proxies for interactive preview
//!
//! # Examples
//!
//! ```ignore
//! use postframe_core::decode::decode_image;
//!
//! let bytes = std::fs::read("photo.jpg").unwrap();
//! let image = decode_image(&bytes).unwrap();
//! println!("Decoded {}x{} image", image.width, image.height);
//! ```

mod resize;
mod source;
mod types;

pub use resize::downscale_to_fit;
pub use source::{decode_image, probe_dimensions};
pub use types::{DecodeError, DecodedImage, Orientation};
