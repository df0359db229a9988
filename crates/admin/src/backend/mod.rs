//! External collaborators: the identity provider and the document store.
//!
//! The dashboard never talks to a backend SDK directly. Everything goes
//! through the two narrow traits below so the upload guard, the session gate
//! and the routes run unchanged against the hosted Firebase project or the
//! in-process [`memory`] backend.
//!
//! # Implementations
//!
//! - [`firebase`] - Identity Toolkit + Firestore over their REST APIs
//! - [`memory`] - In-process backend for local development and tests

pub mod document;
pub mod error;
pub mod firebase;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::stream::BoxStream;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use shopfloor_core::{DocumentId, Email};

pub use document::{
    Direction, FieldValue, Fields, StoredDocument, order_documents,
};
pub use error::{AuthError, AuthErrorKind, BackendError, BackendErrorCode};
pub use firebase::FirebaseBackend;
pub use memory::{MemoryBackend, StoreCall};

/// Full ordered result set of a query.
pub type Snapshot = Vec<StoredDocument>;

/// Standing ordered query. Yields the full result set once on subscription
/// and again after every change. Dropping the stream unsubscribes.
pub type Subscription = BoxStream<'static, Result<Snapshot, BackendError>>;

/// Session-change notifications, starting with the current state.
pub type SessionChanges = BoxStream<'static, Result<SessionState, AuthError>>;

/// An authenticated admin session issued by the identity provider.
///
/// Implements `Debug` manually to redact the tokens.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    /// Provider-assigned user ID.
    pub uid: String,
    /// Email the admin signed in with.
    pub email: Email,
    /// Short-lived token authorizing store calls.
    pub id_token: String,
    /// Long-lived token used to mint new ID tokens.
    pub refresh_token: String,
    /// When `id_token` stops being accepted.
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("uid", &self.uid)
            .field("email", &self.email)
            .field("id_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl AuthSession {
    /// Tokens are refreshed this long before they actually expire.
    pub const EXPIRY_SKEW_SECS: i64 = 60;

    /// Whether the ID token should be refreshed before use.
    #[must_use]
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(Self::EXPIRY_SKEW_SECS) >= self.expires_at
    }
}

/// Observed session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// An admin is signed in. The session may carry refreshed tokens.
    SignedIn(AuthSession),
    /// Nobody is signed in.
    SignedOut,
}

/// Verifies credentials and tracks admin sessions.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify an email/password pair and open a session.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] classified by [`AuthErrorKind`].
    async fn sign_in(&self, email: &Email, password: &SecretString)
    -> Result<AuthSession, AuthError>;

    /// Close a session.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] if the provider could not be reached.
    async fn sign_out(&self, session: &AuthSession) -> Result<(), AuthError>;

    /// Observe the state of a (possibly absent) session.
    ///
    /// The stream emits the current state first, then every later
    /// transition the provider learns about.
    fn session_changes(&self, current: Option<AuthSession>) -> SessionChanges;
}

/// Stores, deletes and queries documents in named collections.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a document with a store-assigned ID.
    ///
    /// [`FieldValue::ServerTimestamp`] fields are stamped by the store.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] if the write was rejected or not delivered.
    async fn create(&self, collection: &str, body: Fields) -> Result<DocumentId, BackendError>;

    /// Delete a document by ID.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] if the delete was rejected or not delivered.
    async fn delete(&self, collection: &str, id: &DocumentId) -> Result<(), BackendError>;

    /// Subscribe to a collection ordered by one field.
    fn subscribe_ordered(
        &self,
        collection: &str,
        order_field: &str,
        direction: Direction,
    ) -> Subscription;
}

/// Binds a [`DocumentStore`] to an authenticated session.
///
/// The hosted store authorizes every call with the signed-in admin's
/// ID token, so handlers obtain a store per request.
pub trait DocumentStoreFactory: Send + Sync {
    /// A store acting on behalf of `session`.
    fn for_session(&self, session: &AuthSession) -> Arc<dyn DocumentStore>;
}
