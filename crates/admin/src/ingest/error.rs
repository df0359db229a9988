//! Image pipeline failures.

use thiserror::Error;

/// Why an image could not be turned into a storable string.
///
/// Every variant is terminal for the attempt; nothing is retried.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The declared media type is not `image/*`.
    #[error("unsupported media type: {media_type}")]
    InvalidFileType {
        /// Media type as declared by the browser.
        media_type: String,
    },

    /// The bytes could not be read into a decodable source.
    #[error("failed to read image: {0}")]
    ReadFailed(#[source] std::io::Error),

    /// The bytes do not decode as a supported image format.
    #[error("failed to decode image: {0}")]
    DecodeFailed(#[source] image::ImageError),

    /// Re-encoding the resized raster failed.
    #[error("failed to encode image: {0}")]
    EncodeFailed(#[source] image::ImageError),

    /// The encoded string exceeds the document field ceiling.
    #[error("encoded image is {len} characters, limit is {max}")]
    EncodedPayloadTooLarge {
        /// Length of the encoded string.
        len: usize,
        /// Configured ceiling.
        max: usize,
    },

    /// The blocking worker running the pipeline panicked or was cancelled.
    #[error("image worker failed: {0}")]
    Worker(String),
}

impl IngestError {
    /// Short description of the failure for the upload form.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidFileType { .. } => "Please upload a valid image file".to_string(),
            Self::ReadFailed(_) => "Failed to read file".to_string(),
            Self::DecodeFailed(_) => "Failed to load image".to_string(),
            Self::EncodeFailed(_) | Self::Worker(_) => "Failed to process image".to_string(),
            Self::EncodedPayloadTooLarge { .. } => {
                "Image file is too large. Please use an image under 500KB.".to_string()
            }
        }
    }
}
