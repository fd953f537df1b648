//! User-selected source images.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::decode::{decode_image, probe_dimensions, DecodeError, DecodedImage};

/// Identifies one selected image for the lifetime of a publish batch.
/// Ids are assigned in selection order and never reused within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceId(pub u32);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A file as it arrives from the picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// Immutable reference to a selected image's encoded bytes.
///
/// Cloning is cheap (the bytes are shared), which lets the pipeline keep the
/// original around for a forced re-crop while a surface works on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    id: SourceId,
    name: String,
    bytes: Arc<[u8]>,
}

impl SourceImage {
    pub fn new(id: SourceId, name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            id,
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Upright dimensions read from the header.
    pub fn probe_dimensions(&self) -> Result<(u32, u32), DecodeError> {
        probe_dimensions(&self.bytes)
    }

    /// Full decode with EXIF orientation applied.
    pub fn decode(&self) -> Result<DecodedImage, DecodeError> {
        decode_image(&self.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_shares_bytes() {
        let source = SourceImage::new(SourceId(4), "a.jpg", vec![1u8, 2, 3]);
        let copy = source.clone();
        assert_eq!(copy.bytes().as_ptr(), source.bytes().as_ptr());
        assert_eq!(copy.id(), SourceId(4));
        assert_eq!(copy.name(), "a.jpg");
    }

    #[test]
    fn test_decode_failure_reports_error() {
        let source = SourceImage::new(SourceId(1), "broken.jpg", vec![0u8; 16]);
        assert_eq!(source.decode(), Err(DecodeError::InvalidFormat));
        assert!(source.probe_dimensions().is_err());
    }

    #[test]
    fn test_source_id_display() {
        assert_eq!(SourceId(3).to_string(), "#3");
    }
}
