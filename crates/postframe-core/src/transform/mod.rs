//! Raster transforms used by the crop surface.
//!
//! # Transform Order
//!
//! When an image is cropped, operations run in this order:
//! 1. Orientation pre-pass (quarter-turn rotation, then mirror)
//! 2. Crop window computed by [`crate::geometry`] on the oriented canvas
//! 3. Window rendered to the destination size (preview or export)
//!
//! Filters are not part of this chain; they run once at publish time.

mod crop;
mod rotation;

pub use crop::render_crop;
pub use rotation::orient;
