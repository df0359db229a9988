//! Session middleware configuration for admin.
//!
//! Sessions live in the process ([`AdminSessionStore`]); they hold only the
//! identity provider's tokens and a flash message, and a restart simply
//! signs the admin out. Stricter security settings apply (SameSite=Strict,
//! 24hr expiry). Expired records are swept hourly.

use std::time::Duration;

use tower_sessions::{Expiry, Session, SessionManagerLayer};

use super::session_store::AdminSessionStore;

use crate::config::AdminConfig;
use crate::models::Flash;
use crate::models::session::keys;

/// Session cookie name for admin.
pub const SESSION_COOKIE_NAME: &str = "shopfloor_admin_session";

/// Session expiry time in seconds (24 hours).
const SESSION_EXPIRY_SECONDS: i64 = 24 * 60 * 60;

/// How often expired session records are removed.
const EXPIRY_SWEEP_PERIOD: Duration = Duration::from_secs(60 * 60);

/// Create the session layer with an in-process store and start its
/// expiry sweep.
///
/// Must be called inside a Tokio runtime.
#[must_use]
pub fn create_session_layer(config: &AdminConfig) -> SessionManagerLayer<AdminSessionStore> {
    let store = AdminSessionStore::default();
    store.spawn_expiry_sweep(EXPIRY_SWEEP_PERIOD);

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_secure())
        .with_same_site(tower_sessions::cookie::SameSite::Strict)
        .with_http_only(true)
        .with_path("/")
}

/// Queue a flash message for the next rendered page.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_flash(session: &Session, flash: Flash) -> Result<(), tower_sessions::session::Error> {
    session.insert(keys::FLASH, flash).await
}

/// Take the pending flash message, if any.
///
/// # Errors
///
/// Returns an error if the session cannot be read.
pub async fn take_flash(session: &Session) -> Result<Option<Flash>, tower_sessions::session::Error> {
    session.remove::<Flash>(keys::FLASH).await
}
