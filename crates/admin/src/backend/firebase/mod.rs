//! Firebase over REST: Identity Toolkit for admin sign-in, Secure Token for
//! refreshing ID tokens, and Firestore for the product documents.
//!
//! Every Firestore call is authorized with the signed-in admin's ID token,
//! so the project's security rules see the same identity the browser SDK
//! would present.

mod auth;
mod firestore;
pub mod live;
pub mod value;

use std::sync::Arc;

use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use url::Url;

use crate::config::FirebaseConfig;

pub use firestore::FirestoreStore;
pub use live::LiveQueries;

use super::{AuthSession, BackendError, DocumentStore, DocumentStoreFactory};

/// Firebase project client.
///
/// Cheap to clone; the HTTP connection pool, config and running live
/// queries are shared.
#[derive(Clone)]
pub struct FirebaseBackend {
    client: Client,
    config: Arc<FirebaseConfig>,
    live: LiveQueries,
}

impl std::fmt::Debug for FirebaseBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseBackend")
            .field("config", &self.config)
            .field("live", &self.live)
            .finish_non_exhaustive()
    }
}

impl FirebaseBackend {
    /// Create a client for the configured project.
    #[must_use]
    pub fn new(config: FirebaseConfig) -> Self {
        let live = LiveQueries::new(config.poll_interval);
        Self {
            client: Client::new(),
            config: Arc::new(config),
            live,
        }
    }
}

impl DocumentStoreFactory for FirebaseBackend {
    fn for_session(&self, session: &AuthSession) -> Arc<dyn DocumentStore> {
        Arc::new(FirestoreStore::new(
            self.client.clone(),
            Arc::clone(&self.config),
            session.id_token.clone(),
            self.live.clone(),
        ))
    }
}

/// Resolve an API path against a configured base URL.
///
/// Paths such as `accounts:signInWithPassword` contain a colon, so they are
/// anchored with `./` to keep them from parsing as a URL scheme.
pub(crate) fn endpoint(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    base.join(&format!("./{}", path.trim_start_matches('/')))
}

/// Error envelope shared by the Google REST APIs.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorDetail {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Canonical status name for an HTTP status without an error body.
pub(crate) const fn status_name(status: StatusCode) -> &'static str {
    match status.as_u16() {
        400 => "INVALID_ARGUMENT",
        401 => "UNAUTHENTICATED",
        403 => "PERMISSION_DENIED",
        404 => "NOT_FOUND",
        409 => "ALREADY_EXISTS",
        429 => "RESOURCE_EXHAUSTED",
        503 | 504 => "UNAVAILABLE",
        _ => "UNKNOWN",
    }
}

/// Parse an error body returned alongside `status`.
pub(crate) fn parse_error_body(status: StatusCode, body: &str) -> BackendError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        return BackendError::new(
            super::BackendErrorCode::PayloadTooLarge,
            format!("request rejected with {status}"),
        );
    }
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => BackendError::classify(
            parsed
                .error
                .status
                .as_deref()
                .unwrap_or_else(|| status_name(status)),
            parsed.error.message,
        ),
        Err(_) => BackendError::classify(status_name(status), format!("{status}: {body}")),
    }
}

/// Turn a non-success response into a [`BackendError`].
pub(crate) async fn error_from_response(response: Response) -> BackendError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    parse_error_body(status, &body)
}
