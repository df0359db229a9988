//! HTTP route handlers for admin.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                    - Health check
//!
//! # Auth (email + password against the identity provider)
//! GET  /auth/login                - Login page (redirects to / when signed in)
//! POST /auth/login                - Sign in
//! POST /auth/logout               - Sign out
//!
//! # Dashboard
//! GET  /                          - Upload form + product list
//!
//! # Products
//! POST /products                  - Upload a product (multipart)
//! GET  /products/list             - Product list fragment
//! GET  /products/stream           - Live product list (server-sent events)
//! GET  /products/{id}/delete      - Delete confirmation
//! POST /products/{id}/delete      - Delete a product
//! ```

pub mod auth;
pub mod dashboard;
pub mod products;

use axum::{Router, extract::DefaultBodyLimit, routing::get};
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::middleware::create_session_layer;
use crate::state::AppState;

/// All page and fragment routes, without layers.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .merge(auth::router())
        .merge(dashboard::router())
        .merge(products::router())
}

/// Build the full application: routes, static files, sessions, body
/// limit, request tracing and Sentry.
pub fn build_router(state: AppState) -> Router {
    let session_layer = create_session_layer(state.config());
    let body_limit = state.config().upload_body_limit;

    Router::new()
        .merge(routes())
        .nest_service("/static", ServeDir::new("crates/admin/static"))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(session_layer)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check the backend.
async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use secrecy::SecretString;
    use tower::ServiceExt;

    use shopfloor_core::{Email, PRODUCTS_COLLECTION};

    use super::*;
    use crate::backend::MemoryBackend;
    use crate::config::{AdminConfig, BackendConfig, MemoryBackendConfig};
    use crate::ingest::IngestPolicy;

    fn app() -> Router {
        let email = Email::parse("admin@example.com").unwrap();
        let password = SecretString::from("hunter2-but-longer".to_string());
        let config = AdminConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 3001,
            base_url: "http://localhost:3001".to_string(),
            session_secret: SecretString::from("x".repeat(32)),
            backend: BackendConfig::Memory(MemoryBackendConfig {
                admin_email: email.clone(),
                admin_password: password.clone(),
            }),
            products_collection: PRODUCTS_COLLECTION.to_string(),
            ingest: IngestPolicy::default(),
            upload_body_limit: 1024 * 1024,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
            tls: None,
        };
        let backend = MemoryBackend::with_admin(email, password);
        build_router(AppState::new(
            config,
            Arc::new(backend.clone()),
            Arc::new(backend),
        ))
    }

    #[tokio::test]
    async fn test_health() {
        let resp = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_dashboard_requires_sign_in() {
        let resp = app()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers()[header::LOCATION], "/auth/login");
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let resp = app()
            .oneshot(Request::get("/orders").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
