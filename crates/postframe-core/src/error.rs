//! Errors raised by the publish pipeline.

use thiserror::Error;

use crate::decode::DecodeError;
use crate::encode::EncodeError;
use crate::source::SourceId;

/// A batch that cannot be submitted as it stands.
///
/// Validation runs before any upload, so none of these leave anything
/// behind in storage.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Select at least one image")]
    NoImages,

    #[error("{pending} image(s) still need to be cropped")]
    CropsPending { pending: usize },

    #[error("Stories take exactly one image, {count} selected")]
    StoryImageCount { count: usize },

    #[error("Story images must be 9:16, got aspect {aspect:.4}")]
    StoryAspect { aspect: f64 },

    #[error("Cropped image {source_id} is {actual:.4}, expected {expected:.4}")]
    AspectMismatch {
        source_id: SourceId,
        expected: f64,
        actual: f64,
    },

    #[error("Image {source_id} is not the next one to crop")]
    NotQueueHead { source_id: SourceId },

    #[error("Invalid aspect ratio {aspect}")]
    InvalidAspect { aspect: f64 },

    #[error("At most {max} images per post")]
    TooManyImages { max: usize },
}

/// Failure anywhere between selection and the saved record.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PublishError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Could not read image: {0}")]
    Decode(#[from] DecodeError),

    #[error("Could not encode image: {0}")]
    Encode(#[from] EncodeError),

    /// The operation is not allowed in the pipeline's current state.
    #[error("Cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: &'static str,
    },

    #[error("{remaining} upload(s) have not finished")]
    UploadsPending { remaining: usize },

    /// An upload failed. No record was created; `orphaned` lists keys that
    /// did make it to storage.
    #[error("Upload of image {position} ({key}) failed: {reason}")]
    Upload {
        position: usize,
        key: String,
        reason: String,
        orphaned: Vec<String>,
    },

    /// Every upload succeeded but the record could not be saved.
    #[error("Could not save post: {reason}")]
    Persist {
        reason: String,
        orphaned: Vec<String>,
    },
}

impl PublishError {
    /// Storage keys left behind by this failure.
    pub fn orphaned_keys(&self) -> &[String] {
        match self {
            PublishError::Upload { orphaned, .. } | PublishError::Persist { orphaned, .. } => {
                orphaned
            }
            _ => &[],
        }
    }
}
