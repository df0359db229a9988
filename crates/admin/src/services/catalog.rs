//! Product list and delete.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use thiserror::Error;
use tracing::{info, instrument, warn};

use shopfloor_core::{DocumentId, Product, ProductId, field_names};

use crate::backend::{BackendError, Direction, DocumentStore, Snapshot};
use crate::models::product_from_document;

/// A failed delete.
#[derive(Debug, Error)]
#[error("failed to delete product: {0}")]
pub struct DeleteError(#[from] pub BackendError);

impl DeleteError {
    /// Message shown after a failed delete.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        "Error deleting product. Please try again."
    }
}

/// Failure while loading the product list.
#[derive(Debug, Error)]
pub enum ListError {
    /// The subscription reported an error.
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// The subscription ended before producing a snapshot.
    #[error("product subscription closed")]
    Closed,
}

impl ListError {
    /// Message shown in place of the list.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        "Error loading products."
    }
}

/// Products newest first, skipping documents that do not hold a product.
fn products_from_snapshot(snapshot: Snapshot) -> Vec<Product> {
    snapshot
        .into_iter()
        .filter_map(|doc| {
            let id = doc.id.clone();
            product_from_document(doc)
                .map_err(|e| warn!(document_id = %id, error = %e, "Skipping malformed product"))
                .ok()
        })
        .collect()
}

/// Reads and deletes products in one collection.
pub struct CatalogService {
    store: Arc<dyn DocumentStore>,
    collection: String,
}

impl CatalogService {
    /// Create a catalog over `collection`.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    /// Live product list, newest first. Emits the full list on every change.
    pub fn subscribe(
        &self,
    ) -> impl Stream<Item = Result<Vec<Product>, BackendError>> + Send + use<> {
        self.store
            .subscribe_ordered(&self.collection, field_names::CREATED_AT, Direction::Descending)
            .map(|snapshot| snapshot.map(products_from_snapshot))
    }

    /// Current product list, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`ListError`] if the first snapshot could not be read.
    pub async fn list(&self) -> Result<Vec<Product>, ListError> {
        let mut products = std::pin::pin!(self.subscribe());
        match products.next().await {
            Some(result) => Ok(result?),
            None => Err(ListError::Closed),
        }
    }

    /// Look up one product in the current list.
    ///
    /// # Errors
    ///
    /// Returns [`ListError`] if the list could not be read.
    pub async fn find(&self, id: &ProductId) -> Result<Option<Product>, ListError> {
        Ok(self.list().await?.into_iter().find(|p| p.id == *id))
    }

    /// Delete one product by ID.
    ///
    /// # Errors
    ///
    /// Returns [`DeleteError`] if the store rejected or never received the
    /// delete.
    #[instrument(skip(self), fields(collection = %self.collection, product_id = %id))]
    pub async fn delete(&self, id: &ProductId) -> Result<(), DeleteError> {
        let document_id: DocumentId = id.clone().into();
        self.store.delete(&self.collection, &document_id).await?;
        info!("Product deleted");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use shopfloor_core::{Category, Email, NewProduct, Price, ProductName};

    use super::*;
    use crate::backend::{FieldValue, Fields, MemoryBackend};
    use crate::models::new_product_fields;

    fn backend() -> MemoryBackend {
        MemoryBackend::with_admin(
            Email::parse("admin@example.com").unwrap(),
            SecretString::from("pw".to_string()),
        )
    }

    async fn seed(backend: &MemoryBackend, name: &str) -> ProductId {
        let product = NewProduct {
            name: ProductName::parse(name).unwrap(),
            price: Price::parse("5000").unwrap(),
            category: Category::parse("Sneakers").unwrap(),
            image_base64: "data:image/jpeg;base64,AAAA".to_string(),
        };
        backend
            .create("products", new_product_fields(&product))
            .await
            .unwrap()
            .into()
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let backend = backend();
        seed(&backend, "First").await;
        seed(&backend, "Second").await;

        let catalog = CatalogService::new(Arc::new(backend), "products");
        let names: Vec<String> = catalog
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name.as_str().to_string())
            .collect();
        assert_eq!(names, vec!["Second", "First"]);
    }

    #[tokio::test]
    async fn test_malformed_documents_are_skipped() {
        let backend = backend();
        seed(&backend, "Good").await;
        let mut junk = Fields::new();
        junk.insert("createdAt".to_string(), FieldValue::ServerTimestamp);
        backend.create("products", junk).await.unwrap();

        let catalog = CatalogService::new(Arc::new(backend), "products");
        assert_eq!(catalog.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_removes_only_that_product() {
        let backend = backend();
        let keep = seed(&backend, "Keep").await;
        let gone = seed(&backend, "Gone").await;

        let catalog = CatalogService::new(Arc::new(backend.clone()), "products");
        catalog.delete(&gone).await.unwrap();

        let remaining = catalog.list().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, keep);
        assert!(catalog.find(&gone).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_failure_message() {
        let backend = backend();
        let id = seed(&backend, "Sticky").await;
        backend.fail_next_delete(BackendError::unavailable("offline"));

        let catalog = CatalogService::new(Arc::new(backend.clone()), "products");
        let err = catalog.delete(&id).await.unwrap_err();
        assert_eq!(err.user_message(), "Error deleting product. Please try again.");
        assert_eq!(backend.documents("products").len(), 1);
    }
}
