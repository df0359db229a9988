//! Integration tests for the admin login gate.
//!
//! Each test serves the dashboard over the in-memory backend; see the
//! crate docs for how the harness is set up.

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;

use shopfloor_admin::backend::{AuthError, AuthErrorKind};
use shopfloor_integration_tests::{ADMIN_EMAIL, ADMIN_PASSWORD, TestApp, location};

// ============================================================================
// Session Gate
// ============================================================================

#[tokio::test]
async fn test_dashboard_redirects_to_login_when_signed_out() {
    let app = TestApp::spawn().await;

    let resp = app.get("/").await;

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/auth/login");
}

#[tokio::test]
async fn test_login_page_renders_form_when_signed_out() {
    let app = TestApp::spawn().await;

    let resp = app.get("/auth/login").await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.unwrap();
    assert!(body.contains("id=\"login-form\""));
}

#[tokio::test]
async fn test_login_page_redirects_to_dashboard_when_signed_in() {
    let app = TestApp::spawn().await;
    app.login().await;

    let resp = app.get("/auth/login").await;

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/");
}

#[tokio::test]
async fn test_fragments_are_unauthorized_when_signed_out() {
    let app = TestApp::spawn().await;

    assert_eq!(app.get("/products/list").await.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.get("/products/stream").await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_revoked_session_is_sent_back_to_login() {
    let app = TestApp::spawn().await;
    app.login().await;
    assert_eq!(app.get("/").await.status(), StatusCode::OK);

    app.backend.revoke_all_sessions();

    let resp = app.get("/").await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/auth/login");

    // The stale session was cleared, so the login form renders again.
    assert_eq!(app.get("/auth/login").await.status(), StatusCode::OK);
}

// ============================================================================
// Sign In
// ============================================================================

#[tokio::test]
async fn test_login_shows_admin_email_on_dashboard() {
    let app = TestApp::spawn().await;
    app.login().await;

    let resp = app.get("/").await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.unwrap();
    assert!(body.contains(ADMIN_EMAIL));
    assert!(body.contains("No products yet. Upload your first product!"));
}

#[tokio::test]
async fn test_login_wrong_password() {
    let app = TestApp::spawn().await;

    let resp = app.login_with(ADMIN_EMAIL, "not-the-password").await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = resp.text().await.unwrap();
    assert!(body.contains("Incorrect password. Please try again."));
    // The email is kept in the form, the password is not.
    assert!(body.contains(ADMIN_EMAIL));
    assert!(!body.contains("not-the-password"));
}

#[tokio::test]
async fn test_login_unknown_account() {
    let app = TestApp::spawn().await;

    let resp = app.login_with("someone@example.com", ADMIN_PASSWORD).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = resp.text().await.unwrap();
    assert!(body.contains("No account found."));
}

#[tokio::test]
async fn test_login_malformed_email() {
    let app = TestApp::spawn().await;

    let resp = app.login_with("not-an-email", ADMIN_PASSWORD).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = resp.text().await.unwrap();
    assert!(body.contains("Invalid email address format."));
}

#[tokio::test]
async fn test_login_disabled_account() {
    let app = TestApp::spawn().await;
    app.backend
        .disable_account(&shopfloor_integration_tests::admin_email());

    let resp = app.login_with(ADMIN_EMAIL, ADMIN_PASSWORD).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = resp.text().await.unwrap();
    assert!(body.contains("This account has been disabled."));
}

#[tokio::test]
async fn test_login_provider_failures_show_their_messages() {
    let cases = [
        (
            AuthErrorKind::TooManyRequests,
            "Too many failed attempts. Please try again later.",
        ),
        (
            AuthErrorKind::InvalidCredential,
            "Invalid credentials. Check your email and password.",
        ),
        (
            AuthErrorKind::InvalidApiKey,
            "Identity provider configuration error. Check your API key.",
        ),
        (
            AuthErrorKind::NetworkRequestFailed,
            "Network error. Check your internet connection.",
        ),
    ];

    let app = TestApp::spawn().await;
    for (kind, expected) in cases {
        app.backend
            .fail_next_sign_in(AuthError::new(kind.clone(), "scripted failure"));

        let resp = app.login_with(ADMIN_EMAIL, ADMIN_PASSWORD).await;

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{kind:?}");
        let body = resp.text().await.unwrap();
        assert!(body.contains(expected), "{kind:?} rendered: {body}");
    }

    // Once the scripted failures are used up the same credentials work.
    app.login().await;
}

// ============================================================================
// Sign Out
// ============================================================================

#[tokio::test]
async fn test_logout_returns_to_login() {
    let app = TestApp::spawn().await;
    app.login().await;

    let resp = app.post("/auth/logout").await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/auth/login");

    let resp = app.get("/").await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/auth/login");
}
