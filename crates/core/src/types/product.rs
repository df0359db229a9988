//! Product records as stored in the `products` collection.
//!
//! Field names are part of the external contract: documents written by
//! earlier versions of the dashboard use exactly these keys, so they must
//! never be renamed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::id::ProductId;
use super::price::Price;

/// Name of the collection holding product documents.
pub const PRODUCTS_COLLECTION: &str = "products";

/// Document field names for product records.
pub mod field_names {
    /// Product display name.
    pub const NAME: &str = "name";
    /// Numeric price.
    pub const PRICE: &str = "price";
    /// Free-text category.
    pub const CATEGORY: &str = "category";
    /// Embedded `data:` URI holding the product image.
    pub const IMAGE: &str = "imageBase64";
    /// Server-assigned creation timestamp (ordering key).
    pub const CREATED_AT: &str = "createdAt";
}

/// Errors for required text fields.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// The field is empty after trimming.
    #[error("{0} cannot be empty")]
    Blank(&'static str),
}

fn required_text(field: &'static str, value: &str) -> Result<String, FieldError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(FieldError::Blank(field));
    }
    Ok(value.to_owned())
}

/// A non-empty, trimmed product name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductName(String);

impl ProductName {
    /// Parse a product name from form input.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError`] if the trimmed name is empty.
    pub fn parse(value: &str) -> Result<Self, FieldError> {
        required_text("name", value).map(Self)
    }

    /// The name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A product category.
///
/// The dashboard offers a fixed list of suggestions, but any non-empty text
/// is accepted so new categories need no deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    /// Categories offered in the upload form.
    pub const SUGGESTED: &'static [&'static str] =
        &["Sneakers", "Sandals", "Slippers", "Loafers", "Boots", "Heels", "Accessories"];

    /// Parse a category from form input.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError`] if the trimmed category is empty.
    pub fn parse(value: &str) -> Result<Self, FieldError> {
        required_text("category", value).map(Self)
    }

    /// The category as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated product ready to be written.
///
/// Carries no identifier and no timestamp: the store assigns the document ID
/// and the server stamps `createdAt` at write time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    /// Display name.
    pub name: ProductName,
    /// Positive price.
    pub price: Price,
    /// Category.
    pub category: Category,
    /// Embedded image (`data:image/jpeg;base64,...`).
    pub image_base64: String,
}

/// A product read back from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    /// Store-assigned identifier.
    pub id: ProductId,
    /// Display name.
    pub name: ProductName,
    /// Positive price.
    pub price: Price,
    /// Category.
    pub category: Category,
    /// Embedded image (`data:image/jpeg;base64,...`).
    pub image_base64: String,
    /// Server-assigned creation time.
    pub created_at: DateTime<Utc>,
}
