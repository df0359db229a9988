//! Firestore document store over REST, bound to one admin's ID token.

use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, instrument, warn};

use shopfloor_core::DocumentId;

use super::live::{Fetch, LiveQueries, QueryKey};
use super::{endpoint, error_from_response, value};
use crate::backend::{
    BackendError, Direction, DocumentStore, FieldValue, Fields, Snapshot, StoredDocument,
    Subscription,
};
use crate::config::FirebaseConfig;

#[derive(Debug, Deserialize)]
struct WireDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunQueryItem {
    #[serde(default)]
    document: Option<WireDocument>,
}

impl WireDocument {
    fn into_stored(self) -> Result<StoredDocument, BackendError> {
        let raw_id = self
            .name
            .rsplit('/')
            .next()
            .ok_or_else(|| BackendError::malformed(format!("document name {}", self.name)))?;
        let id = DocumentId::parse(raw_id)
            .map_err(|e| BackendError::malformed(format!("document name {}: {e}", self.name)))?;
        Ok(StoredDocument {
            id,
            fields: value::decode_fields(&self.fields)?,
        })
    }
}

/// Firestore client acting on behalf of one signed-in admin.
#[derive(Clone)]
pub struct FirestoreStore {
    client: Client,
    config: Arc<FirebaseConfig>,
    id_token: String,
    live: LiveQueries,
}

impl std::fmt::Debug for FirestoreStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirestoreStore")
            .field("project_id", &self.config.project_id)
            .field("id_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl FirestoreStore {
    pub(crate) const fn new(
        client: Client,
        config: Arc<FirebaseConfig>,
        id_token: String,
        live: LiveQueries,
    ) -> Self {
        Self {
            client,
            config,
            id_token,
            live,
        }
    }

    /// `projects/{project}/databases/(default)/documents`
    fn documents_root(&self) -> String {
        format!(
            "projects/{}/databases/(default)/documents",
            self.config.project_id
        )
    }

    fn url(&self, path: &str) -> Result<url::Url, BackendError> {
        endpoint(&self.config.firestore_url, path)
            .map_err(|e| BackendError::malformed(format!("endpoint {path}: {e}")))
    }

    /// Build the commit request creating `collection/id` from `body`.
    fn commit_body(&self, collection: &str, id: &DocumentId, body: &Fields) -> Value {
        let transforms: Vec<Value> = body
            .iter()
            .filter(|(_, v)| matches!(v, FieldValue::ServerTimestamp))
            .map(|(name, _)| {
                json!({
                    "fieldPath": value::field_path(name),
                    "setToServerValue": "REQUEST_TIME",
                })
            })
            .collect();

        let mut write = json!({
            "update": {
                "name": format!("{}/{collection}/{id}", self.documents_root()),
                "fields": value::encode_fields(body),
            },
            "currentDocument": { "exists": false },
        });
        if !transforms.is_empty() {
            write["updateTransforms"] = Value::Array(transforms);
        }

        json!({ "writes": [write] })
    }

    /// Run a one-shot ordered query over a collection.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] if the query was rejected or not delivered.
    #[instrument(skip(self), fields(collection = %collection))]
    pub async fn run_ordered_query(
        &self,
        collection: &str,
        order_field: &str,
        direction: Direction,
    ) -> Result<Snapshot, BackendError> {
        let url = self.url(&format!("{}:runQuery", self.documents_root()))?;
        let query = json!({
            "structuredQuery": {
                "from": [{ "collectionId": collection }],
                "orderBy": [{
                    "field": { "fieldPath": value::field_path(order_field) },
                    "direction": direction.as_wire(),
                }],
            }
        });

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.id_token)
            .json(&query)
            .send()
            .await
            .map_err(|e| BackendError::unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let items: Vec<RunQueryItem> = response
            .json()
            .await
            .map_err(|e| BackendError::malformed(e.to_string()))?;

        items
            .into_iter()
            .filter_map(|item| item.document)
            .map(WireDocument::into_stored)
            .collect()
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    #[instrument(skip(self, body), fields(collection = %collection))]
    async fn create(&self, collection: &str, body: Fields) -> Result<DocumentId, BackendError> {
        let id = DocumentId::random();
        let url = self.url(&format!("{}:commit", self.documents_root()))?;

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.id_token)
            .json(&self.commit_body(collection, &id, &body))
            .send()
            .await
            .map_err(|e| BackendError::unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let err = error_from_response(response).await;
            warn!(code = %err.code, "Create rejected");
            return Err(err);
        }

        debug!(document_id = %id, "Document created");
        Ok(id)
    }

    #[instrument(skip(self), fields(collection = %collection, document_id = %id))]
    async fn delete(&self, collection: &str, id: &DocumentId) -> Result<(), BackendError> {
        let url = self.url(&format!("{}/{collection}/{id}", self.documents_root()))?;

        let response = self
            .client
            .delete(url)
            .bearer_auth(&self.id_token)
            .send()
            .await
            .map_err(|e| BackendError::unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let err = error_from_response(response).await;
            warn!(code = %err.code, "Delete rejected");
            return Err(err);
        }

        debug!("Document deleted");
        Ok(())
    }

    /// Firestore's REST surface has no push channel, so the standing query
    /// is emulated by polling. Subscribers to the same query share one
    /// poller, which emits only when the result set changes. An error ends
    /// the subscription.
    fn subscribe_ordered(
        &self,
        collection: &str,
        order_field: &str,
        direction: Direction,
    ) -> Subscription {
        let key = QueryKey {
            collection: collection.to_string(),
            order_field: order_field.to_string(),
            direction,
        };
        let store = self.clone();
        let query = key.clone();
        let fetch: Fetch = Arc::new(move || {
            let store = store.clone();
            let query = query.clone();
            async move {
                store
                    .run_ordered_query(&query.collection, &query.order_field, query.direction)
                    .await
            }
            .boxed()
        });

        self.live.subscribe(key, fetch)
    }
}
