//! HTTP middleware stack for admin.
//!
//! # Middleware Order (outermost first, see `routes::build_router`)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request tracing)
//! 3. Session layer (tower-sessions with an in-process, swept store)
//! 4. Request body limit (multipart uploads)
//!
//! Authentication is enforced per handler with the [`RequireAdminAuth`]
//! extractor.

pub mod auth;
pub mod session;
pub mod session_store;

pub use auth::{
    AdminAuthRejection, RequireAdminAuth, clear_current_admin, resolve_gate, set_current_admin,
};
pub use session::{SESSION_COOKIE_NAME, create_session_layer, set_flash, take_flash};
pub use session_store::AdminSessionStore;
