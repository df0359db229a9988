//! Image ingestion pipeline.
//!
//! Turns an uploaded image into a compact `data:image/jpeg;base64,...`
//! string that fits inside a single product document:
//!
//! 1. reject anything whose declared media type is not `image/*`
//! 2. sniff the format and decode
//! 3. downscale to at most [`IngestPolicy::max_width`] pixels wide,
//!    keeping the aspect ratio
//! 4. flatten to RGB and re-encode as JPEG
//!
//! Decoding and encoding are CPU-bound and run on the blocking pool.
//! The hard ceiling on the encoded length is checked by the caller with
//! [`ensure_within_limit`] so a too-large result never reaches the store.

mod error;

use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use tracing::{debug, instrument, warn};

pub use error::IngestError;

/// Prefix of every encoded image.
pub const DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

/// Limits applied by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestPolicy {
    /// Images wider than this are downscaled to exactly this width.
    pub max_width: u32,
    /// JPEG quality, 1-100.
    pub jpeg_quality: u8,
    /// Source files above this size get an advisory warning.
    pub soft_limit_bytes: usize,
    /// Hard ceiling on the encoded string, in characters.
    pub max_encoded_chars: usize,
}

impl Default for IngestPolicy {
    fn default() -> Self {
        Self {
            max_width: 800,
            jpeg_quality: 70,
            soft_limit_bytes: 1024 * 1024,
            max_encoded_chars: 1_000_000,
        }
    }
}

/// An uploaded file as received from the browser.
#[derive(Clone)]
pub struct ImageFile {
    /// Client-side file name.
    pub file_name: String,
    /// Declared media type (e.g. `image/png`).
    pub media_type: String,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for ImageFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageFile")
            .field("file_name", &self.file_name)
            .field("media_type", &self.media_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

impl ImageFile {
    /// Size of the file in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the declared media type is an image type.
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.media_type.starts_with("image/")
    }
}

/// Non-fatal observations made while encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestWarning {
    /// The source file is larger than the advisory limit.
    OversizedSource {
        /// Source size in bytes.
        bytes: usize,
        /// Advisory limit in bytes.
        limit: usize,
    },
}

impl IngestWarning {
    /// Advisory text shown alongside the result.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::OversizedSource { .. } => {
                "Image size should be less than 1MB for best performance"
            }
        }
    }
}

/// Result of a successful pipeline run.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    /// `data:image/jpeg;base64,...`
    pub data_uri: String,
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Decoded source width in pixels.
    pub source_width: u32,
    /// Decoded source height in pixels.
    pub source_height: u32,
    /// Advisory warnings.
    pub warnings: Vec<IngestWarning>,
}

impl EncodedImage {
    /// Length of the encoded string in characters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data_uri.len()
    }

    /// Whether the encoded string is empty. Never true for pipeline output.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data_uri.is_empty()
    }
}

/// Output dimensions for a source of `width` x `height`.
///
/// Sources wider than `max_width` are scaled to exactly `max_width` wide
/// with the height rounded to the nearest pixel (never below 1).
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn target_dimensions(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if width <= max_width {
        return (width, height);
    }
    let scaled = (f64::from(height) * f64::from(max_width) / f64::from(width)).round();
    (max_width, (scaled as u32).max(1))
}

/// Encode an image file for storage inside a document.
///
/// # Errors
///
/// Returns [`IngestError::InvalidFileType`] before touching the bytes if the
/// media type is not an image type; otherwise the first stage that fails.
#[instrument(skip(file, policy), fields(file_name = %file.file_name, media_type = %file.media_type, size = file.size()))]
pub async fn encode_image_for_storage(
    file: ImageFile,
    policy: &IngestPolicy,
) -> Result<EncodedImage, IngestError> {
    if !file.is_image() {
        return Err(IngestError::InvalidFileType {
            media_type: file.media_type,
        });
    }

    let mut warnings = Vec::new();
    if file.size() > policy.soft_limit_bytes {
        warn!(limit = policy.soft_limit_bytes, "Source image exceeds advisory size");
        warnings.push(IngestWarning::OversizedSource {
            bytes: file.size(),
            limit: policy.soft_limit_bytes,
        });
    }

    let max_width = policy.max_width;
    let quality = policy.jpeg_quality;
    let bytes = file.bytes;

    let mut encoded = tokio::task::spawn_blocking(move || {
        let decoded = decode(bytes)?;
        encode(&decoded, max_width, quality)
    })
    .await
    .map_err(|e| IngestError::Worker(e.to_string()))??;

    debug!(
        source_width = encoded.source_width,
        source_height = encoded.source_height,
        width = encoded.width,
        height = encoded.height,
        encoded_len = encoded.len(),
        "Image encoded"
    );

    encoded.warnings = warnings;
    Ok(encoded)
}

/// Check an encoded image against the hard ceiling.
///
/// # Errors
///
/// Returns [`IngestError::EncodedPayloadTooLarge`] if the string is longer
/// than [`IngestPolicy::max_encoded_chars`].
pub fn ensure_within_limit(encoded: &EncodedImage, policy: &IngestPolicy) -> Result<(), IngestError> {
    if encoded.len() > policy.max_encoded_chars {
        return Err(IngestError::EncodedPayloadTooLarge {
            len: encoded.len(),
            max: policy.max_encoded_chars,
        });
    }
    Ok(())
}

fn decode(bytes: Vec<u8>) -> Result<DynamicImage, IngestError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(IngestError::ReadFailed)?
        .decode()
        .map_err(IngestError::DecodeFailed)
}

fn encode(image: &DynamicImage, max_width: u32, quality: u8) -> Result<EncodedImage, IngestError> {
    let (source_width, source_height) = (image.width(), image.height());
    let (width, height) = target_dimensions(source_width, source_height, max_width);

    let rgb = if (width, height) == (source_width, source_height) {
        image.to_rgb8()
    } else {
        image.resize_exact(width, height, FilterType::Triangle).to_rgb8()
    };

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality)
        .encode_image(&rgb)
        .map_err(IngestError::EncodeFailed)?;

    let mut data_uri = String::with_capacity(DATA_URI_PREFIX.len() + jpeg.len().div_ceil(3) * 4);
    data_uri.push_str(DATA_URI_PREFIX);
    STANDARD.encode_string(&jpeg, &mut data_uri);

    Ok(EncodedImage {
        data_uri,
        width,
        height,
        source_width,
        source_height,
        warnings: Vec::new(),
    })
}
