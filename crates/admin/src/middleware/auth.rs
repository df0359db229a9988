//! Authentication middleware and extractors for admin.
//!
//! Every protected request runs the dashboard [`SessionGate`] against the
//! identity provider, so expired ID tokens are refreshed (and written back
//! to the session) before any store call is made.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::warn;

use crate::error::set_sentry_user;
use crate::models::CurrentAdmin;
use crate::models::session::keys;
use crate::services::{GateDecision, Page, SessionGate};
use crate::state::AppState;

/// Extractor that requires admin authentication.
///
/// If the admin is not logged in, returns a redirect to the login page
/// for page requests, or 401 Unauthorized for fragment requests (the
/// product list and its live stream).
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAdminAuth(admin): RequireAdminAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", admin.email)
/// }
/// ```
pub struct RequireAdminAuth(pub CurrentAdmin);

/// Error returned when admin authentication is required but the user is not logged in.
#[derive(Debug)]
pub enum AdminAuthRejection {
    /// Redirect to login page (for page requests).
    RedirectToLogin,
    /// Unauthorized response (for fragment requests).
    Unauthorized,
    /// The session could not be verified; nothing was decided.
    Unverified,
    /// The session store failed.
    Session,
}

impl IntoResponse for AdminAuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to(Page::Login.path()).into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            Self::Unverified => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Could not verify your session. Please try again.",
            )
                .into_response(),
            Self::Session => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

/// Paths that return HTML fragments or event streams rather than pages.
fn is_fragment_request(parts: &Parts) -> bool {
    let path = parts.uri.path();
    path == "/products/list" || path == "/products/stream"
}

impl FromRequestParts<AppState> for RequireAdminAuth {
    type Rejection = AdminAuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Get the session from extensions (set by SessionManagerLayer)
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or(AdminAuthRejection::Unauthorized)?;

        let decision = resolve_gate(state, &session, Page::Dashboard)
            .await
            .map_err(|e| {
                warn!(error = %e, "Session store error during auth");
                AdminAuthRejection::Session
            })?;

        match decision {
            GateDecision::Proceed(Some(auth)) => {
                let admin = CurrentAdmin::from(auth);
                set_sentry_user(&admin.uid, Some(admin.email.as_str()));
                Ok(Self(admin))
            }
            GateDecision::Stay => Err(AdminAuthRejection::Unverified),
            GateDecision::Proceed(None) | GateDecision::Redirect(_) => {
                if is_fragment_request(parts) {
                    Err(AdminAuthRejection::Unauthorized)
                } else {
                    Err(AdminAuthRejection::RedirectToLogin)
                }
            }
        }
    }
}

/// Run the session gate for `page` against the stored session.
///
/// Refreshed tokens are written back to the session; a session the
/// provider no longer recognises is cleared.
///
/// # Errors
///
/// Returns an error if the session cannot be read or modified.
pub async fn resolve_gate(
    state: &AppState,
    session: &Session,
    page: Page,
) -> Result<GateDecision, tower_sessions::session::Error> {
    let stored: Option<CurrentAdmin> = session.get(keys::CURRENT_ADMIN).await?;
    let changes = state
        .identity()
        .session_changes(stored.as_ref().map(|admin| admin.auth.clone()));
    let decision = SessionGate::new(page).run(changes).await;

    if let Some(current) = &stored {
        match &decision {
            GateDecision::Proceed(Some(auth)) if *auth != current.auth => {
                set_current_admin(session, &CurrentAdmin::from(auth.clone())).await?;
            }
            GateDecision::Proceed(None) | GateDecision::Redirect(Page::Login) => {
                clear_current_admin(session).await?;
            }
            _ => {}
        }
    }

    Ok(decision)
}

/// Helper to set the current admin in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_admin(
    session: &Session,
    admin: &CurrentAdmin,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(keys::CURRENT_ADMIN, admin).await
}

/// Helper to clear the current admin from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_admin(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.remove::<CurrentAdmin>(keys::CURRENT_ADMIN).await?;
    Ok(())
}
