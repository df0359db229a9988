//! Errors reported by the identity provider and the document store.
//!
//! Both collaborators report failures as a classification code plus a raw
//! message. The codes drive the user-facing messages; the raw message is
//! kept for logs and for the generic fallback.

use std::fmt;

use thiserror::Error;

/// Classification of a document store failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendErrorCode {
    /// Security rules rejected the call.
    PermissionDenied,
    /// The caller's credential is missing, expired or revoked.
    Unauthenticated,
    /// The store could not be reached.
    Unavailable,
    /// The document exceeds the store's size limit.
    PayloadTooLarge,
    /// The addressed document does not exist.
    NotFound,
    /// The request was malformed.
    InvalidArgument,
    /// A code this client does not recognise.
    Other(String),
}

impl BackendErrorCode {
    /// Map a canonical status name (`PERMISSION_DENIED`, ...) to a code.
    #[must_use]
    pub fn from_status(status: &str) -> Self {
        match status {
            "PERMISSION_DENIED" => Self::PermissionDenied,
            "UNAUTHENTICATED" => Self::Unauthenticated,
            "UNAVAILABLE" | "DEADLINE_EXCEEDED" => Self::Unavailable,
            "NOT_FOUND" => Self::NotFound,
            "INVALID_ARGUMENT" | "FAILED_PRECONDITION" => Self::InvalidArgument,
            other => Self::Other(other.to_string()),
        }
    }

    /// Canonical name of the code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::PermissionDenied => "permission-denied",
            Self::Unauthenticated => "unauthenticated",
            Self::Unavailable => "unavailable",
            Self::PayloadTooLarge => "payload-too-large",
            Self::NotFound => "not-found",
            Self::InvalidArgument => "invalid-argument",
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for BackendErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed document store call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct BackendError {
    /// Classification code.
    pub code: BackendErrorCode,
    /// Raw detail from the store or transport.
    pub message: String,
}

impl BackendError {
    /// Create an error with an explicit code.
    pub fn new(code: BackendErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Classify an error reported by the store.
    ///
    /// Size rejections arrive as `INVALID_ARGUMENT` with an explanatory
    /// message, so the message is inspected to recover that case.
    #[must_use]
    pub fn classify(status: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        let code = if lower.contains("too large") || lower.contains("exceeds the maximum allowed size")
        {
            BackendErrorCode::PayloadTooLarge
        } else {
            BackendErrorCode::from_status(status)
        };
        Self { code, message }
    }

    /// The store could not be reached.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(BackendErrorCode::Unavailable, message)
    }

    /// Security rules rejected the call.
    pub fn permission_denied() -> Self {
        Self::new(
            BackendErrorCode::PermissionDenied,
            "Missing or insufficient permissions.",
        )
    }

    /// The store returned something this client cannot interpret.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(
            BackendErrorCode::Other("malformed-response".to_string()),
            message,
        )
    }
}

/// Classification of an identity provider failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// No account exists for the email.
    UserNotFound,
    /// The password does not match.
    WrongPassword,
    /// The email is not well formed.
    InvalidEmail,
    /// The provider is throttling sign-in attempts.
    TooManyRequests,
    /// Email or password is wrong (the provider does not say which).
    InvalidCredential,
    /// The provider could not be reached.
    NetworkRequestFailed,
    /// The project's API key was rejected.
    InvalidApiKey,
    /// The account has been disabled.
    UserDisabled,
    /// The session's tokens are no longer valid.
    TokenExpired,
    /// A code this client does not recognise.
    Other(String),
}

impl AuthErrorKind {
    /// Map an Identity Toolkit error message (`EMAIL_NOT_FOUND`,
    /// `TOO_MANY_ATTEMPTS_TRY_LATER : ...`) to a kind.
    #[must_use]
    pub fn from_code(raw: &str) -> Self {
        let code = raw.split(" : ").next().unwrap_or(raw).trim();
        match code {
            "EMAIL_NOT_FOUND" | "USER_NOT_FOUND" => Self::UserNotFound,
            "INVALID_PASSWORD" => Self::WrongPassword,
            "INVALID_EMAIL" | "MISSING_EMAIL" => Self::InvalidEmail,
            "TOO_MANY_ATTEMPTS_TRY_LATER" => Self::TooManyRequests,
            "INVALID_LOGIN_CREDENTIALS" | "MISSING_PASSWORD" => Self::InvalidCredential,
            "USER_DISABLED" => Self::UserDisabled,
            "INVALID_ID_TOKEN" | "TOKEN_EXPIRED" | "INVALID_REFRESH_TOKEN" | "CREDENTIAL_TOO_OLD_LOGIN_AGAIN" => {
                Self::TokenExpired
            }
            _ if code.starts_with("API key not valid") || code == "API_KEY_INVALID" => {
                Self::InvalidApiKey
            }
            other => Self::Other(other.to_string()),
        }
    }
}

/// A failed identity provider call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("auth error ({kind:?}): {message}")]
pub struct AuthError {
    /// Classification.
    pub kind: AuthErrorKind,
    /// Raw detail from the provider or transport.
    pub message: String,
}

impl AuthError {
    /// Create an error of the given kind.
    pub fn new(kind: AuthErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The provider could not be reached.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::NetworkRequestFailed, message)
    }

    /// Message shown on the login page.
    #[must_use]
    pub fn user_message(&self) -> String {
        match &self.kind {
            AuthErrorKind::UserNotFound => {
                "No account found. Did you create an admin user in the identity provider?".to_string()
            }
            AuthErrorKind::WrongPassword => "Incorrect password. Please try again.".to_string(),
            AuthErrorKind::InvalidEmail => "Invalid email address format.".to_string(),
            AuthErrorKind::TooManyRequests => {
                "Too many failed attempts. Please try again later.".to_string()
            }
            AuthErrorKind::InvalidCredential => {
                "Invalid credentials. Check your email and password.".to_string()
            }
            AuthErrorKind::NetworkRequestFailed => {
                "Network error. Check your internet connection.".to_string()
            }
            AuthErrorKind::InvalidApiKey => {
                "Identity provider configuration error. Check your API key.".to_string()
            }
            AuthErrorKind::UserDisabled => "This account has been disabled.".to_string(),
            AuthErrorKind::TokenExpired => "Your session has expired. Please log in again.".to_string(),
            AuthErrorKind::Other(_) => self.message.clone(),
        }
    }
}
