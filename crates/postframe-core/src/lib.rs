//! Postframe Core - Image crop and publish library
//!
//! This crate provides the image side of posting to a social feed: decoding
//! picked photos, interactive crop geometry, preset filters, and the
//! multi-image publish pipeline that uploads the results and creates the
//! post or story record.

pub mod backend;
pub mod config;
pub mod decode;
pub mod encode;
pub mod error;
pub mod filter;
pub mod geometry;
pub mod pipeline;
pub mod preview;
pub mod source;
pub mod surface;
pub mod transform;

pub use backend::{
    best_effort, parse_image_paths, public_urls, remove_post_images, storage_key, BackendError,
    NewRecord, ObjectStorage, RecordId, RecordStore,
};
pub use config::{CropPreset, PipelineConfig};
pub use decode::{DecodeError, DecodedImage};
pub use encode::{EncodeError, JpegQuality};
pub use error::{PublishError, ValidationError};
pub use filter::{apply_filter, FilterSpec};
pub use geometry::{compute_crop_rect, CropRect, CropTransform, NormalizedRect, STORY_ASPECT};
pub use pipeline::{
    CropAdvance, CroppedImage, PendingUpload, PublishContext, PublishPipeline, PublishReceipt,
    PublishState, PublishTarget, SelectionOutcome, UploadPlan,
};
pub use preview::PreviewHandle;
pub use source::{SelectedFile, SourceId, SourceImage};
pub use surface::{CropOutput, CropSurface, SurfaceError, SurfaceOptions, SurfaceStatus};
