//! Decoding of user-selected source files with EXIF orientation handling.

use std::io::Cursor;

use exif::{In, Reader, Tag};
use image::{DynamicImage, ImageReader};

use super::{DecodeError, DecodedImage, Orientation};

/// Decode a selected image from bytes, applying EXIF orientation correction.
///
/// The format is guessed from the content, so JPEG and PNG selections both
/// work. The result is upright RGB: what the user sees in their gallery is
/// what the crop surface starts from.
///
/// # Errors
///
/// Returns `DecodeError::Empty` for no bytes, `DecodeError::InvalidFormat`
/// when the format cannot be recognized, and `DecodeError::CorruptedFile`
/// when decoding fails part way.
pub fn decode_image(bytes: &[u8]) -> Result<DecodedImage, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }

    let orientation = read_orientation(bytes);

    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;
    if reader.format().is_none() {
        return Err(DecodeError::InvalidFormat);
    }

    let img = reader
        .decode()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;

    let rgb = apply_orientation(img, orientation).into_rgb8();
    let decoded = DecodedImage::from_rgb_image(rgb);
    if decoded.is_empty() {
        return Err(DecodeError::ZeroSized {
            width: decoded.width,
            height: decoded.height,
        });
    }

    log::debug!("decoded {}x{} source ({:?})", decoded.width, decoded.height, orientation);
    Ok(decoded)
}

/// Read upright dimensions from the image header without decoding pixels.
///
/// EXIF rotations of 90/270 degrees swap the reported width and height so
/// the result matches what [`decode_image`] would produce.
pub fn probe_dimensions(bytes: &[u8]) -> Result<(u32, u32), DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }

    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;
    if reader.format().is_none() {
        return Err(DecodeError::InvalidFormat);
    }

    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;

    let swaps = matches!(
        read_orientation(bytes),
        Orientation::Transpose
            | Orientation::Rotate90CW
            | Orientation::Transverse
            | Orientation::Rotate270CW
    );
    Ok(if swaps { (height, width) } else { (width, height) })
}

/// Extract EXIF orientation, falling back to `Normal` when absent.
fn read_orientation(bytes: &[u8]) -> Orientation {
    let mut cursor = Cursor::new(bytes);
    match Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => exif
            .get_field(Tag::Orientation, In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .map(Orientation::from)
            .unwrap_or_default(),
        Err(_) => Orientation::Normal,
    }
}

fn apply_orientation(img: DynamicImage, orientation: Orientation) -> DynamicImage {
    match orientation {
        Orientation::Normal => img,
        Orientation::FlipHorizontal => img.fliph(),
        Orientation::Rotate180 => img.rotate180(),
        Orientation::FlipVertical => img.flipv(),
        Orientation::Transpose => img.rotate90().fliph(),
        Orientation::Rotate90CW => img.rotate90(),
        Orientation::Transverse => img.rotate270().fliph(),
        Orientation::Rotate270CW => img.rotate270(),
    }
}
