//! Upload error types.

use thiserror::Error;

use crate::backend::{BackendError, BackendErrorCode};
use crate::ingest::IngestError;

/// Prefix of every message about a failed upload attempt.
const UPLOAD_PREFIX: &str = "Error uploading product: ";

/// Form problems detected before any work is done.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A field or the file is missing.
    #[error("Please fill all fields")]
    MissingFields,
    /// The price is not a positive number.
    #[error("Please enter a valid price")]
    InvalidPrice,
    /// The selected file is not an image.
    #[error("Please upload a valid image file")]
    InvalidFileType,
}

/// Errors that can occur while uploading a product.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Rejected locally; nothing was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The image could not be encoded, or is too large once encoded.
    #[error("image pipeline: {0}")]
    Ingest(#[from] IngestError),

    /// The store rejected or never received the write.
    #[error("document store: {0}")]
    Backend(#[from] BackendError),
}

impl UploadError {
    /// Message shown next to the upload form.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(err) => err.to_string(),
            Self::Ingest(IngestError::InvalidFileType { .. }) => {
                ValidationError::InvalidFileType.to_string()
            }
            Self::Ingest(err) => format!("{UPLOAD_PREFIX}{}", err.user_message()),
            Self::Backend(err) => match err.code {
                BackendErrorCode::PermissionDenied => format!(
                    "{UPLOAD_PREFIX}Permission denied. Make sure you are logged in as admin."
                ),
                BackendErrorCode::PayloadTooLarge => format!(
                    "{UPLOAD_PREFIX}Image file is too large. Please use an image under 500KB."
                ),
                BackendErrorCode::Unavailable => {
                    format!("{UPLOAD_PREFIX}Network error. Check your internet connection.")
                }
                _ => format!("{UPLOAD_PREFIX}{}", err.message),
            },
        }
    }

    /// Whether the failure was detected before contacting the store.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Ingest(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_messages() {
        let cases = [
            (
                BackendError::permission_denied(),
                "Error uploading product: Permission denied. Make sure you are logged in as admin.",
            ),
            (
                BackendError::new(BackendErrorCode::PayloadTooLarge, "too big"),
                "Error uploading product: Image file is too large. Please use an image under 500KB.",
            ),
            (
                BackendError::unavailable("connection refused"),
                "Error uploading product: Network error. Check your internet connection.",
            ),
            (
                BackendError::new(BackendErrorCode::Other("ABORTED".to_string()), "contention"),
                "Error uploading product: contention",
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(UploadError::from(err).user_message(), expected);
        }
    }

    #[test]
    fn test_oversized_encoding_message() {
        let err = UploadError::from(IngestError::EncodedPayloadTooLarge {
            len: 1_200_000,
            max: 1_000_000,
        });
        assert_eq!(
            err.user_message(),
            "Error uploading product: Image file is too large. Please use an image under 500KB."
        );
        assert!(err.is_local());
    }

    #[test]
    fn test_validation_messages() {
        assert_eq!(
            UploadError::from(ValidationError::MissingFields).user_message(),
            "Please fill all fields"
        );
        assert_eq!(
            UploadError::from(ValidationError::InvalidPrice).user_message(),
            "Please enter a valid price"
        );
        assert_eq!(
            UploadError::from(ValidationError::InvalidFileType).user_message(),
            "Please upload a valid image file"
        );
    }
}
