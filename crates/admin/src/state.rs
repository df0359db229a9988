//! Application state shared across handlers.

use std::sync::Arc;

use crate::backend::{
    AuthSession, DocumentStoreFactory, FirebaseBackend, IdentityProvider, MemoryBackend,
};
use crate::config::{AdminConfig, BackendConfig};
use crate::services::{CatalogService, UploadService};

/// Application state shared across all handlers.
///
/// Cheap to clone; everything lives behind one `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AdminConfig,
    identity: Arc<dyn IdentityProvider>,
    stores: Arc<dyn DocumentStoreFactory>,
}

impl AppState {
    /// Build state with explicit collaborators.
    #[must_use]
    pub fn new(
        config: AdminConfig,
        identity: Arc<dyn IdentityProvider>,
        stores: Arc<dyn DocumentStoreFactory>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                identity,
                stores,
            }),
        }
    }

    /// Build state with the collaborators named in the configuration.
    #[must_use]
    pub fn from_config(config: AdminConfig) -> Self {
        match &config.backend {
            BackendConfig::Firebase(firebase) => {
                let backend = FirebaseBackend::new(firebase.clone());
                Self::new(config, Arc::new(backend.clone()), Arc::new(backend))
            }
            BackendConfig::Memory(memory) => {
                let backend = MemoryBackend::with_admin(
                    memory.admin_email.clone(),
                    memory.admin_password.clone(),
                );
                Self::new(config, Arc::new(backend.clone()), Arc::new(backend))
            }
        }
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &AdminConfig {
        &self.inner.config
    }

    /// Get the identity provider.
    #[must_use]
    pub fn identity(&self) -> &dyn IdentityProvider {
        self.inner.identity.as_ref()
    }

    /// Upload service acting on behalf of `session`.
    #[must_use]
    pub fn uploads(&self, session: &AuthSession) -> UploadService {
        UploadService::new(
            self.inner.stores.for_session(session),
            self.inner.config.products_collection.clone(),
            self.inner.config.ingest.clone(),
        )
    }

    /// Catalog acting on behalf of `session`.
    #[must_use]
    pub fn catalog(&self, session: &AuthSession) -> CatalogService {
        CatalogService::new(
            self.inner.stores.for_session(session),
            self.inner.config.products_collection.clone(),
        )
    }
}
