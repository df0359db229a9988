//! In-process identity provider and document store.
//!
//! Used for local development (`ADMIN_BACKEND=memory`) and as the recording
//! fake in tests: recent store calls are logged, failures can be scripted per
//! operation, `createdAt`-style server timestamps are strictly increasing,
//! and subscribers receive a fresh snapshot after every change.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::watch;
use tracing::{debug, instrument};

use shopfloor_core::{DocumentId, Email};

use super::{
    AuthError, AuthErrorKind, AuthSession, BackendError, Direction,
    DocumentStore, DocumentStoreFactory, FieldValue, Fields, IdentityProvider, SessionChanges,
    SessionState, Snapshot, StoredDocument, Subscription, order_documents,
};

/// Lifetime of issued ID tokens.
const TOKEN_LIFETIME_SECS: i64 = 3600;

/// Most recent store calls kept in the call log; older ones are dropped.
pub const MAX_RECORDED_CALLS: usize = 256;

/// A store call, as recorded by the fake.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    /// `create(collection, body)`
    Create {
        /// Target collection.
        collection: String,
        /// Body as submitted (sentinels unresolved).
        body: Fields,
    },
    /// `delete(collection, id)`
    Delete {
        /// Target collection.
        collection: String,
        /// Target document.
        id: DocumentId,
    },
    /// `subscribe_ordered(collection, field, direction)`
    Subscribe {
        /// Queried collection.
        collection: String,
        /// Ordering field.
        order_field: String,
        /// Ordering direction.
        direction: Direction,
    },
}

struct Account {
    uid: String,
    email: Email,
    password: SecretString,
    disabled: bool,
}

#[derive(Default)]
struct State {
    accounts: Vec<Account>,
    /// Active ID tokens mapped to the owning uid.
    active_tokens: HashMap<String, String>,
    collections: HashMap<String, Vec<StoredDocument>>,
    last_timestamp: Option<DateTime<Utc>>,
    calls: VecDeque<StoreCall>,
    create_failures: VecDeque<BackendError>,
    delete_failures: VecDeque<BackendError>,
    sign_in_failures: VecDeque<AuthError>,
}

impl State {
    fn record(&mut self, call: StoreCall) {
        if self.calls.len() == MAX_RECORDED_CALLS {
            self.calls.pop_front();
        }
        self.calls.push_back(call);
    }
}

struct Inner {
    state: Mutex<State>,
    /// Bumped on every document change.
    documents_version: watch::Sender<u64>,
    /// Bumped on every session change.
    sessions_version: watch::Sender<u64>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self, collection: &str, order_field: &str, direction: Direction) -> Snapshot {
        let docs = self
            .state()
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default();
        order_documents(docs, order_field, direction)
    }

    fn session_state(&self, current: Option<&AuthSession>) -> SessionState {
        match current {
            Some(session)
                if self
                    .state()
                    .active_tokens
                    .get(&session.id_token)
                    .is_some_and(|uid| *uid == session.uid) =>
            {
                SessionState::SignedIn(session.clone())
            }
            _ => SessionState::SignedOut,
        }
    }

    fn record(&self, call: StoreCall) {
        self.state().record(call);
    }

    fn notify_documents(&self) {
        self.documents_version.send_modify(|v| *v += 1);
    }

    fn notify_sessions(&self) {
        self.sessions_version.send_modify(|v| *v += 1);
    }
}

/// In-memory backend implementing both collaborator traits.
///
/// Cloning is cheap; clones share the same state.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state();
        f.debug_struct("MemoryBackend")
            .field("accounts", &state.accounts.len())
            .field("active_sessions", &state.active_tokens.len())
            .field("collections", &state.collections.len())
            .field("calls", &state.calls.len())
            .finish_non_exhaustive()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create an empty backend with no accounts.
    #[must_use]
    pub fn new() -> Self {
        let (documents_version, _) = watch::channel(0);
        let (sessions_version, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                documents_version,
                sessions_version,
            }),
        }
    }

    /// Create a backend with a single admin account.
    #[must_use]
    pub fn with_admin(email: Email, password: SecretString) -> Self {
        let backend = Self::new();
        backend.add_account(email, password);
        backend
    }

    /// Register an account; returns its uid.
    pub fn add_account(&self, email: Email, password: SecretString) -> String {
        let uid = random_token(28);
        self.inner.state().accounts.push(Account {
            uid: uid.clone(),
            email,
            password,
            disabled: false,
        });
        uid
    }

    /// Disable an account. Its open sessions are revoked.
    pub fn disable_account(&self, email: &Email) {
        {
            let mut state = self.inner.state();
            let mut revoked_uid = None;
            for account in &mut state.accounts {
                if account.email.matches(email) {
                    account.disabled = true;
                    revoked_uid = Some(account.uid.clone());
                }
            }
            if let Some(uid) = revoked_uid {
                state.active_tokens.retain(|_, owner| *owner != uid);
            }
        }
        self.inner.notify_sessions();
    }

    /// Revoke every open session, as if they all expired.
    pub fn revoke_all_sessions(&self) {
        self.inner.state().active_tokens.clear();
        self.inner.notify_sessions();
    }

    /// Make the next `create` call fail with `error`.
    pub fn fail_next_create(&self, error: BackendError) {
        self.inner.state().create_failures.push_back(error);
    }

    /// Make the next `delete` call fail with `error`.
    pub fn fail_next_delete(&self, error: BackendError) {
        self.inner.state().delete_failures.push_back(error);
    }

    /// Make the next `sign_in` call fail with `error`.
    pub fn fail_next_sign_in(&self, error: AuthError) {
        self.inner.state().sign_in_failures.push_back(error);
    }

    /// The most recent store calls, oldest first, at most
    /// [`MAX_RECORDED_CALLS`].
    #[must_use]
    pub fn calls(&self) -> Vec<StoreCall> {
        self.inner.state().calls.iter().cloned().collect()
    }

    /// Number of `create` calls in the call log.
    #[must_use]
    pub fn create_calls(&self) -> usize {
        self.inner
            .state()
            .calls
            .iter()
            .filter(|call| matches!(call, StoreCall::Create { .. }))
            .count()
    }

    /// Documents of a collection in insertion order.
    #[must_use]
    pub fn documents(&self, collection: &str) -> Vec<StoredDocument> {
        self.inner
            .state()
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Next server timestamp: the wall clock, nudged forward when needed so
    /// that timestamps strictly increase in commit order.
    fn next_timestamp(state: &mut State) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match state.last_timestamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        state.last_timestamp = Some(stamp);
        stamp
    }
}

fn random_token(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[async_trait]
impl IdentityProvider for MemoryBackend {
    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_in(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthSession, AuthError> {
        let session = {
            let mut state = self.inner.state();
            if let Some(error) = state.sign_in_failures.pop_front() {
                return Err(error);
            }

            let account = state
                .accounts
                .iter()
                .find(|account| account.email.matches(email))
                .ok_or_else(|| AuthError::new(AuthErrorKind::UserNotFound, "EMAIL_NOT_FOUND"))?;
            if account.disabled {
                return Err(AuthError::new(AuthErrorKind::UserDisabled, "USER_DISABLED"));
            }
            if account.password.expose_secret() != password.expose_secret() {
                return Err(AuthError::new(
                    AuthErrorKind::WrongPassword,
                    "INVALID_PASSWORD",
                ));
            }

            let session = AuthSession {
                uid: account.uid.clone(),
                email: account.email.clone(),
                id_token: random_token(40),
                refresh_token: random_token(40),
                expires_at: Utc::now() + Duration::seconds(TOKEN_LIFETIME_SECS),
            };
            state
                .active_tokens
                .insert(session.id_token.clone(), session.uid.clone());
            session
        };

        debug!(uid = %session.uid, "Signed in");
        self.inner.notify_sessions();
        Ok(session)
    }

    #[instrument(skip(self, session), fields(uid = %session.uid))]
    async fn sign_out(&self, session: &AuthSession) -> Result<(), AuthError> {
        self.inner.state().active_tokens.remove(&session.id_token);
        self.inner.notify_sessions();
        Ok(())
    }

    fn session_changes(&self, current: Option<AuthSession>) -> SessionChanges {
        let inner = Arc::clone(&self.inner);
        let mut changes = inner.sessions_version.subscribe();

        Box::pin(async_stream::stream! {
            let mut last = inner.session_state(current.as_ref());
            yield Ok(last.clone());

            while changes.changed().await.is_ok() {
                let next = inner.session_state(current.as_ref());
                if next != last {
                    last = next.clone();
                    yield Ok(next);
                }
            }
        })
    }
}

#[async_trait]
impl DocumentStore for MemoryBackend {
    #[instrument(skip(self, body), fields(collection = %collection))]
    async fn create(&self, collection: &str, body: Fields) -> Result<DocumentId, BackendError> {
        let id = {
            let mut state = self.inner.state();
            state.record(StoreCall::Create {
                collection: collection.to_string(),
                body: body.clone(),
            });
            if let Some(error) = state.create_failures.pop_front() {
                return Err(error);
            }

            let mut fields = body;
            if fields
                .values()
                .any(|value| matches!(value, FieldValue::ServerTimestamp))
            {
                let stamp = Self::next_timestamp(&mut state);
                for value in fields.values_mut() {
                    if matches!(value, FieldValue::ServerTimestamp) {
                        *value = FieldValue::Timestamp(stamp);
                    }
                }
            }

            let id = DocumentId::random();
            state
                .collections
                .entry(collection.to_string())
                .or_default()
                .push(StoredDocument {
                    id: id.clone(),
                    fields,
                });
            id
        };

        debug!(document_id = %id, "Document created");
        self.inner.notify_documents();
        Ok(id)
    }

    #[instrument(skip(self), fields(collection = %collection, document_id = %id))]
    async fn delete(&self, collection: &str, id: &DocumentId) -> Result<(), BackendError> {
        {
            let mut state = self.inner.state();
            state.record(StoreCall::Delete {
                collection: collection.to_string(),
                id: id.clone(),
            });
            if let Some(error) = state.delete_failures.pop_front() {
                return Err(error);
            }
            // Deleting a missing document succeeds, like the hosted store.
            if let Some(docs) = state.collections.get_mut(collection) {
                docs.retain(|doc| doc.id != *id);
            }
        }

        self.inner.notify_documents();
        Ok(())
    }

    fn subscribe_ordered(
        &self,
        collection: &str,
        order_field: &str,
        direction: Direction,
    ) -> Subscription {
        self.inner.record(StoreCall::Subscribe {
            collection: collection.to_string(),
            order_field: order_field.to_string(),
            direction,
        });

        let inner = Arc::clone(&self.inner);
        let mut changes = inner.documents_version.subscribe();
        let collection = collection.to_string();
        let order_field = order_field.to_string();

        Box::pin(async_stream::stream! {
            let mut last = inner.snapshot(&collection, &order_field, direction);
            yield Ok(last.clone());

            while changes.changed().await.is_ok() {
                let next = inner.snapshot(&collection, &order_field, direction);
                if next != last {
                    last = next.clone();
                    yield Ok(next);
                }
            }
        })
    }
}

impl DocumentStoreFactory for MemoryBackend {
    fn for_session(&self, _session: &AuthSession) -> Arc<dyn DocumentStore> {
        Arc::new(self.clone())
    }
}
