//! Product upload orchestration.
//!
//! The upload guard runs strictly in order and stops at the first failure:
//! 1. validate the form locally (no network)
//! 2. encode the image ([`crate::ingest`])
//! 3. check the encoded length against the hard ceiling
//! 4. issue exactly one `create` call with a server-stamped `createdAt`

mod error;

pub use error::{UploadError, ValidationError};

use std::sync::Arc;

use tracing::{info, instrument};

use shopfloor_core::{Category, NewProduct, Price, PriceError, ProductId, ProductName};

use crate::backend::DocumentStore;
use crate::ingest::{self, ImageFile, IngestPolicy, IngestWarning};
use crate::models::new_product_fields;

/// Raw upload form as submitted.
#[derive(Debug, Clone, Default)]
pub struct UploadForm {
    /// Product name field.
    pub name: String,
    /// Price field, as typed.
    pub price: String,
    /// Category field.
    pub category: String,
    /// Selected image, if any.
    pub image: Option<ImageFile>,
}

/// Form fields that passed local validation.
#[derive(Debug)]
struct ValidatedForm {
    name: ProductName,
    price: Price,
    category: Category,
    image: ImageFile,
}

impl UploadForm {
    /// Validate the form without touching the image bytes.
    fn validate(self) -> Result<ValidatedForm, ValidationError> {
        let image = self.image.filter(|file| !file.bytes.is_empty());
        let Some(image) = image.filter(|_| {
            [&self.name, &self.price, &self.category]
                .iter()
                .all(|field| !field.trim().is_empty())
        }) else {
            return Err(ValidationError::MissingFields);
        };

        let price = Price::parse(&self.price).map_err(|e| match e {
            PriceError::Empty => ValidationError::MissingFields,
            _ => ValidationError::InvalidPrice,
        })?;

        if !image.is_image() {
            return Err(ValidationError::InvalidFileType);
        }

        let name = ProductName::parse(&self.name).map_err(|_| ValidationError::MissingFields)?;
        let category =
            Category::parse(&self.category).map_err(|_| ValidationError::MissingFields)?;

        Ok(ValidatedForm {
            name,
            price,
            category,
            image,
        })
    }
}

/// Result of a successful upload.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    /// Identifier assigned by the store.
    pub id: ProductId,
    /// Advisories raised by the image pipeline.
    pub warnings: Vec<IngestWarning>,
    /// Length of the stored image string.
    pub encoded_len: usize,
}

/// Runs the upload guard against a document store.
pub struct UploadService {
    store: Arc<dyn DocumentStore>,
    collection: String,
    policy: IngestPolicy,
}

impl UploadService {
    /// Create an upload service writing to `collection`.
    #[must_use]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        collection: impl Into<String>,
        policy: IngestPolicy,
    ) -> Self {
        Self {
            store,
            collection: collection.into(),
            policy,
        }
    }

    /// Validate, encode and store one product.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::Validation`] or [`UploadError::Ingest`] without
    /// contacting the store, or [`UploadError::Backend`] if the single write
    /// failed.
    #[instrument(skip(self, form), fields(collection = %self.collection))]
    pub async fn upload(&self, form: UploadForm) -> Result<UploadOutcome, UploadError> {
        let form = form.validate()?;

        let encoded = ingest::encode_image_for_storage(form.image, &self.policy).await?;
        ingest::ensure_within_limit(&encoded, &self.policy)?;

        let encoded_len = encoded.len();
        let product = NewProduct {
            name: form.name,
            price: form.price,
            category: form.category,
            image_base64: encoded.data_uri,
        };

        let id = self
            .store
            .create(&self.collection, new_product_fields(&product))
            .await?;

        info!(
            product_id = %id,
            name = %product.name,
            encoded_len,
            "Product uploaded"
        );

        Ok(UploadOutcome {
            id: id.into(),
            warnings: encoded.warnings,
            encoded_len,
        })
    }
}
