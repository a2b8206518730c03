//! Post image invariants.

use imagesize::{ImageError, ImageSize};

use crate::domain::error::DomainError;

/// Stored images live under this prefix inside the media root.
pub const POST_IMAGE_PREFIX: &str = "posts";

/// Pixel dimensions of an accepted image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: usize,
    pub height: usize,
}

/// Inspect an uploaded blob and reject anything that is not a decodable image.
pub fn inspect_image(bytes: &[u8]) -> Result<ImageDimensions, DomainError> {
    const INVALID: &str =
        "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

    match imagesize::blob_size(bytes) {
        Ok(ImageSize { width, height }) if width > 0 && height > 0 => {
            Ok(ImageDimensions { width, height })
        }
        Ok(_) | Err(ImageError::NotSupported) | Err(ImageError::CorruptedImage) => {
            Err(DomainError::validation("image", INVALID))
        }
        Err(ImageError::IoError(err)) => Err(DomainError::validation("image", err.to_string())),
    }
}
