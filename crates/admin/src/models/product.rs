//! Mapping between product records and store documents.

use thiserror::Error;

use shopfloor_core::{
    Category, FieldError, NewProduct, Price, PriceError, Product, ProductName, field_names,
};

use crate::backend::{FieldValue, Fields, StoredDocument};

/// A stored document that does not hold a valid product.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProductDocumentError {
    /// A required field is absent or has the wrong type.
    #[error("field {0} is missing or has the wrong type")]
    Missing(&'static str),
    /// A text field fails validation.
    #[error(transparent)]
    Field(#[from] FieldError),
    /// The price fails validation.
    #[error(transparent)]
    Price(#[from] PriceError),
}

/// Build the document body for a new product.
///
/// `createdAt` is the server timestamp sentinel; the store stamps it.
#[must_use]
pub fn new_product_fields(product: &NewProduct) -> Fields {
    let mut fields = Fields::new();
    fields.insert(
        field_names::NAME.to_string(),
        FieldValue::from(product.name.as_str()),
    );
    fields.insert(
        field_names::PRICE.to_string(),
        FieldValue::Double(product.price.to_f64()),
    );
    fields.insert(
        field_names::CATEGORY.to_string(),
        FieldValue::from(product.category.as_str()),
    );
    fields.insert(
        field_names::IMAGE.to_string(),
        FieldValue::from(product.image_base64.as_str()),
    );
    fields.insert(
        field_names::CREATED_AT.to_string(),
        FieldValue::ServerTimestamp,
    );
    fields
}

fn text<'a>(doc: &'a StoredDocument, field: &'static str) -> Result<&'a str, ProductDocumentError> {
    doc.get(field)
        .and_then(FieldValue::as_str)
        .ok_or(ProductDocumentError::Missing(field))
}

/// Read a product back from its document.
///
/// # Errors
///
/// Returns [`ProductDocumentError`] if a field is missing or invalid.
pub fn product_from_document(doc: StoredDocument) -> Result<Product, ProductDocumentError> {
    let name = ProductName::parse(text(&doc, field_names::NAME)?)?;
    let category = Category::parse(text(&doc, field_names::CATEGORY)?)?;
    let image_base64 = text(&doc, field_names::IMAGE)?.to_string();
    let price = doc
        .get(field_names::PRICE)
        .and_then(FieldValue::as_f64)
        .ok_or(ProductDocumentError::Missing(field_names::PRICE))
        .and_then(|n| Price::from_f64(n).map_err(ProductDocumentError::from))?;
    let created_at = doc
        .get(field_names::CREATED_AT)
        .and_then(FieldValue::as_timestamp)
        .ok_or(ProductDocumentError::Missing(field_names::CREATED_AT))?;

    Ok(Product {
        id: doc.id.into(),
        name,
        price,
        category,
        image_base64,
        created_at,
    })
}
