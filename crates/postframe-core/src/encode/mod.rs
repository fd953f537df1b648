//! Image encoding for crop confirmation and publish.
//!
//! # Examples
//!
//! ```ignore
//! use postframe_core::decode::DecodedImage;
//! use postframe_core::encode::{encode_jpeg, JpegQuality};
//!
//! let image = DecodedImage::filled(100, 100, [128, 128, 128]);
//! let jpeg_bytes = encode_jpeg(&image, JpegQuality::new(0.8)).unwrap();
//! println!("Encoded {} bytes", jpeg_bytes.len());
//! ```

mod jpeg;

pub use jpeg::{encode_jpeg, EncodeError, JpegQuality, JPEG_CONTENT_TYPE};
