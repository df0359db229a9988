//! Session-related types for admin authentication.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use shopfloor_core::Email;

use crate::backend::AuthSession;

/// Session-stored admin identity.
///
/// Carries the identity provider's tokens so store calls can be authorized
/// on behalf of the admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentAdmin {
    /// Provider-assigned user ID.
    pub uid: String,
    /// Admin's email address.
    pub email: Email,
    /// Provider session (tokens and expiry).
    pub auth: AuthSession,
}

impl From<AuthSession> for CurrentAdmin {
    fn from(auth: AuthSession) -> Self {
        Self {
            uid: auth.uid.clone(),
            email: auth.email.clone(),
            auth,
        }
    }
}

/// Severity of a flash message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashKind {
    /// Operation completed.
    Success,
    /// Operation failed.
    Error,
}

impl FlashKind {
    /// CSS class suffix for the message box.
    #[must_use]
    pub const fn css_class(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// One-shot message shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    /// Severity.
    pub kind: FlashKind,
    /// Main text.
    pub message: String,
    /// Optional secondary line (advisories).
    pub detail: Option<String>,
}

impl Flash {
    /// A success message.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Success,
            message: message.into(),
            detail: None,
        }
    }

    /// An error message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Error,
            message: message.into(),
            detail: None,
        }
    }

    /// Attach a secondary line.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Session keys for admin authentication data.
pub mod keys {
    /// Key for storing the current logged-in admin.
    pub const CURRENT_ADMIN: &str = "current_admin";

    /// Key for the one-shot flash message.
    pub const FLASH: &str = "flash";
}
