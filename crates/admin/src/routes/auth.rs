//! Authentication route handlers for admin.
//!
//! Email and password are checked by the identity provider; the session
//! only ever holds the tokens it hands back.

use askama::Template;
use axum::{
    Form, Router,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use secrecy::SecretString;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use shopfloor_core::Email;

use crate::backend::{AuthError, AuthErrorKind};
use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{clear_current_admin, resolve_gate, set_current_admin, set_flash, take_flash};
use crate::models::session::keys;
use crate::models::{CurrentAdmin, Flash};
use crate::services::{GateDecision, Page};
use crate::state::AppState;

/// Login page template.
#[derive(Template)]
#[template(path = "auth/login.html")]
struct LoginPageTemplate {
    email: String,
    error: Option<String>,
    flash: Option<Flash>,
}

/// Submitted login form.
#[derive(Deserialize)]
struct LoginForm {
    email: String,
    password: String,
}

/// Build the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", get(login_page).post(login))
        .route("/auth/logout", post(logout))
}

fn render_login(template: &LoginPageTemplate, status: StatusCode) -> Response {
    let body = template.render().unwrap_or_else(|e| {
        tracing::error!("Template render error: {}", e);
        "Internal Server Error".to_string()
    });
    (status, Html(body)).into_response()
}

/// Render the login page, or go to the dashboard if already signed in.
///
/// GET /auth/login
#[instrument(skip_all)]
async fn login_page(State(state): State<AppState>, session: Session) -> Result<Response, AppError> {
    if let GateDecision::Redirect(page) = resolve_gate(&state, &session, Page::Login).await? {
        return Ok(Redirect::to(page.path()).into_response());
    }

    let template = LoginPageTemplate {
        email: String::new(),
        error: None,
        flash: take_flash(&session).await?,
    };
    Ok(render_login(&template, StatusCode::OK))
}

/// Sign in with email and password.
///
/// POST /auth/login
#[instrument(skip_all)]
async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let password = SecretString::from(form.password);

    let result = match Email::parse(&form.email) {
        Ok(email) => state.identity().sign_in(&email, &password).await,
        Err(e) => Err(AuthError::new(AuthErrorKind::InvalidEmail, e.to_string())),
    };

    match result {
        Ok(auth) => {
            let admin = CurrentAdmin::from(auth);
            session.cycle_id().await?;
            set_current_admin(&session, &admin).await?;
            set_sentry_user(&admin.uid, Some(admin.email.as_str()));
            info!(admin_email = %admin.email, "Admin signed in");
            Ok(Redirect::to(Page::Dashboard.path()).into_response())
        }
        Err(err) => {
            warn!(error = %err, "Sign-in failed");
            let template = LoginPageTemplate {
                email: form.email,
                error: Some(err.user_message()),
                flash: None,
            };
            Ok(render_login(&template, StatusCode::UNAUTHORIZED))
        }
    }
}

/// Sign out and clear the session.
///
/// POST /auth/logout
#[instrument(skip_all)]
async fn logout(State(state): State<AppState>, session: Session) -> Result<Response, AppError> {
    let current: Option<CurrentAdmin> = session.get(keys::CURRENT_ADMIN).await?;

    if let Some(admin) = &current
        && let Err(err) = state.identity().sign_out(&admin.auth).await
    {
        warn!(error = %err, "Sign-out failed");
        set_flash(&session, Flash::error("Error logging out. Please try again.")).await?;
        return Ok(Redirect::to(Page::Dashboard.path()).into_response());
    }

    let _ = clear_current_admin(&session).await;
    clear_sentry_user();
    info!("Admin signed out");

    Ok(Redirect::to(Page::Login.path()).into_response())
}
