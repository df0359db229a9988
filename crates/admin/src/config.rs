//! Admin configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ADMIN_BASE_URL` - Public URL for the dashboard
//! - `ADMIN_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//!
//! ## Backend selection
//! - `ADMIN_BACKEND` - `firebase` (default) or `memory`
//!
//! ## Required with `ADMIN_BACKEND=firebase`
//! - `FIREBASE_API_KEY` - Web API key of the Firebase project
//! - `FIREBASE_PROJECT_ID` - Project whose Firestore holds the products
//!
//! ## Required with `ADMIN_BACKEND=memory`
//! - `ADMIN_DEV_EMAIL` - Email of the single local admin account
//! - `ADMIN_DEV_PASSWORD` - Password of the local admin account
//!
//! ## Optional
//! - `ADMIN_HOST` - Bind address (default: 127.0.0.1)
//! - `ADMIN_PORT` - Listen port (default: 3001)
//! - `FIREBASE_AUTH_DOMAIN` - Informational, logged at startup
//! - `FIREBASE_IDENTITY_URL`, `FIREBASE_TOKEN_URL`, `FIRESTORE_URL` - Endpoint
//!   overrides (emulator suite)
//! - `FIRESTORE_POLL_INTERVAL_MS` - Live list refresh interval (default: 2000)
//! - `PRODUCTS_COLLECTION` - Collection name (default: products)
//! - `UPLOAD_MAX_WIDTH` - Downscale bound in pixels (default: 800)
//! - `UPLOAD_JPEG_QUALITY` - Re-encode quality 1-100 (default: 70)
//! - `UPLOAD_SOFT_LIMIT_BYTES` - Advisory source size (default: 1048576)
//! - `UPLOAD_MAX_ENCODED_CHARS` - Hard limit on the encoded image (default: 1000000)
//! - `UPLOAD_BODY_LIMIT_BYTES` - Multipart request body limit (default: 10485760)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`
//!
//! ## Optional (TLS)
//! - `ADMIN_TLS_CERT` - PEM-encoded certificate chain
//! - `ADMIN_TLS_KEY` - PEM-encoded private key

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

use shopfloor_core::{Email, PRODUCTS_COLLECTION};

use crate::ingest::IngestPolicy;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;
const DEFAULT_BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Admin application configuration.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the dashboard
    pub base_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Identity provider and document store
    pub backend: BackendConfig,
    /// Collection holding product documents
    pub products_collection: String,
    /// Image pipeline limits
    pub ingest: IngestPolicy,
    /// Maximum accepted multipart body size in bytes
    pub upload_body_limit: usize,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
    /// TLS configuration for HTTPS (optional)
    pub tls: Option<TlsConfig>,
}

/// Which collaborators back the dashboard.
#[derive(Debug, Clone)]
pub enum BackendConfig {
    /// Hosted Firebase project (Identity Toolkit + Firestore).
    Firebase(FirebaseConfig),
    /// In-process identity provider and document store for local development.
    Memory(MemoryBackendConfig),
}

/// Firebase project configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct FirebaseConfig {
    /// Web API key
    pub api_key: SecretString,
    /// Project ID (e.g., learn-feadc)
    pub project_id: String,
    /// Auth domain (e.g., learn-feadc.firebaseapp.com)
    pub auth_domain: Option<String>,
    /// Identity Toolkit endpoint
    pub identity_url: Url,
    /// Secure Token endpoint (ID token refresh)
    pub token_url: Url,
    /// Firestore REST endpoint
    pub firestore_url: Url,
    /// Interval between live list refreshes
    pub poll_interval: Duration,
}

impl std::fmt::Debug for FirebaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseConfig")
            .field("api_key", &"[REDACTED]")
            .field("project_id", &self.project_id)
            .field("auth_domain", &self.auth_domain)
            .field("identity_url", &self.identity_url.as_str())
            .field("token_url", &self.token_url.as_str())
            .field("firestore_url", &self.firestore_url.as_str())
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl FirebaseConfig {
    /// Default Identity Toolkit endpoint.
    pub const IDENTITY_URL: &'static str = "https://identitytoolkit.googleapis.com/v1/";
    /// Default Secure Token endpoint.
    pub const TOKEN_URL: &'static str = "https://securetoken.googleapis.com/v1/token";
    /// Default Firestore REST endpoint.
    pub const FIRESTORE_URL: &'static str = "https://firestore.googleapis.com/v1/";

    fn from_env() -> Result<Self, ConfigError> {
        let poll_interval_ms = get_env_or_default(
            "FIRESTORE_POLL_INTERVAL_MS",
            &DEFAULT_POLL_INTERVAL_MS.to_string(),
        )
        .parse::<u64>()
        .map_err(|e| {
            ConfigError::InvalidEnvVar("FIRESTORE_POLL_INTERVAL_MS".to_string(), e.to_string())
        })?;
        if poll_interval_ms == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "FIRESTORE_POLL_INTERVAL_MS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            api_key: SecretString::from(get_required_env("FIREBASE_API_KEY")?),
            project_id: get_required_env("FIREBASE_PROJECT_ID")?,
            auth_domain: get_optional_env("FIREBASE_AUTH_DOMAIN"),
            identity_url: parse_url("FIREBASE_IDENTITY_URL", Self::IDENTITY_URL)?,
            token_url: parse_url("FIREBASE_TOKEN_URL", Self::TOKEN_URL)?,
            firestore_url: parse_url("FIRESTORE_URL", Self::FIRESTORE_URL)?,
            poll_interval: Duration::from_millis(poll_interval_ms),
        })
    }
}

/// Local development backend configuration.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct MemoryBackendConfig {
    /// Email of the single admin account
    pub admin_email: Email,
    /// Password of the admin account
    pub admin_password: SecretString,
}

impl std::fmt::Debug for MemoryBackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackendConfig")
            .field("admin_email", &self.admin_email)
            .field("admin_password", &"[REDACTED]")
            .finish()
    }
}

impl MemoryBackendConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let admin_email = Email::parse(&get_required_env("ADMIN_DEV_EMAIL")?)
            .map_err(|e| ConfigError::InvalidEnvVar("ADMIN_DEV_EMAIL".to_string(), e.to_string()))?;
        let admin_password = get_required_env("ADMIN_DEV_PASSWORD")?;
        if admin_password.is_empty() {
            return Err(ConfigError::InvalidEnvVar(
                "ADMIN_DEV_PASSWORD".to_string(),
                "cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            admin_email,
            admin_password: SecretString::from(admin_password),
        })
    }
}

/// TLS configuration for HTTPS.
#[derive(Clone)]
pub struct TlsConfig {
    /// PEM-encoded certificate chain
    pub cert_pem: String,
    /// PEM-encoded private key
    pub key_pem: SecretString,
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("cert_pem", &"[CERTIFICATE]")
            .field("key_pem", &"[REDACTED]")
            .finish()
    }
}

impl TlsConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let cert_pem = get_optional_env("ADMIN_TLS_CERT");
        let key_pem = get_optional_env("ADMIN_TLS_KEY");

        match (cert_pem, key_pem) {
            (Some(cert), Some(key)) => Ok(Some(Self {
                cert_pem: cert,
                key_pem: SecretString::from(key),
            })),
            (None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "ADMIN_TLS_*".to_string(),
                "Both ADMIN_TLS_CERT and ADMIN_TLS_KEY must be set together".to_string(),
            )),
        }
    }
}

impl AdminConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("ADMIN_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("ADMIN_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("ADMIN_PORT", "3001")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("ADMIN_PORT".to_string(), e.to_string()))?;
        let base_url = get_required_env("ADMIN_BASE_URL")?;
        Url::parse(&base_url)
            .map_err(|e| ConfigError::InvalidEnvVar("ADMIN_BASE_URL".to_string(), e.to_string()))?;
        let session_secret = get_validated_secret("ADMIN_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "ADMIN_SESSION_SECRET")?;

        let backend = match get_env_or_default("ADMIN_BACKEND", "firebase").as_str() {
            "firebase" => BackendConfig::Firebase(FirebaseConfig::from_env()?),
            "memory" => BackendConfig::Memory(MemoryBackendConfig::from_env()?),
            other => {
                return Err(ConfigError::InvalidEnvVar(
                    "ADMIN_BACKEND".to_string(),
                    format!("expected 'firebase' or 'memory', got '{other}'"),
                ));
            }
        };

        let ingest = ingest_policy_from_env()?;
        let upload_body_limit = parse_env(
            "UPLOAD_BODY_LIMIT_BYTES",
            DEFAULT_BODY_LIMIT_BYTES,
        )?;

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let tls = TlsConfig::from_env()?;

        Ok(Self {
            host,
            port,
            base_url,
            session_secret,
            backend,
            products_collection: get_env_or_default("PRODUCTS_COLLECTION", PRODUCTS_COLLECTION),
            ingest,
            upload_body_limit,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
            tls,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the dashboard is served over HTTPS (secure cookies).
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

/// Read the image pipeline limits, falling back to the defaults.
fn ingest_policy_from_env() -> Result<IngestPolicy, ConfigError> {
    let defaults = IngestPolicy::default();
    let policy = IngestPolicy {
        max_width: parse_env("UPLOAD_MAX_WIDTH", defaults.max_width)?,
        jpeg_quality: parse_env("UPLOAD_JPEG_QUALITY", defaults.jpeg_quality)?,
        soft_limit_bytes: parse_env("UPLOAD_SOFT_LIMIT_BYTES", defaults.soft_limit_bytes)?,
        max_encoded_chars: parse_env("UPLOAD_MAX_ENCODED_CHARS", defaults.max_encoded_chars)?,
    };

    if policy.max_width == 0 {
        return Err(ConfigError::InvalidEnvVar(
            "UPLOAD_MAX_WIDTH".to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    if !(1..=100).contains(&policy.jpeg_quality) {
        return Err(ConfigError::InvalidEnvVar(
            "UPLOAD_JPEG_QUALITY".to_string(),
            "must be between 1 and 100".to_string(),
        ));
    }

    Ok(policy)
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an optional numeric environment variable.
fn parse_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| {
        raw.parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Parse an endpoint URL, overridable for emulators and tests.
fn parse_url(key: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = get_env_or_default(key, default);
    Url::parse(&raw).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn firebase_config() -> FirebaseConfig {
        FirebaseConfig {
            api_key: SecretString::from("AIzaSyTestOnlyKey0123456789"),
            project_id: "shopfloor-test".to_string(),
            auth_domain: Some("shopfloor-test.firebaseapp.com".to_string()),
            identity_url: Url::parse(FirebaseConfig::IDENTITY_URL).unwrap(),
            token_url: Url::parse(FirebaseConfig::TOKEN_URL).unwrap(),
            firestore_url: Url::parse(FirebaseConfig::FIRESTORE_URL).unwrap(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        // "ab" has entropy of 1 bit per char (50% a, 50% b)
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-session-secret-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_session_secret_too_short() {
        let secret = SecretString::from("short");
        assert!(validate_session_secret(&secret, "TEST_SESSION").is_err());
    }

    #[test]
    fn test_socket_addr_and_secure_flag() {
        let config = AdminConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 3001,
            base_url: "http://localhost:3001".to_string(),
            session_secret: SecretString::from("x".repeat(32)),
            backend: BackendConfig::Firebase(firebase_config()),
            products_collection: PRODUCTS_COLLECTION.to_string(),
            ingest: IngestPolicy::default(),
            upload_body_limit: DEFAULT_BODY_LIMIT_BYTES,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 1.0,
            tls: None,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3001);
        assert!(!config.is_secure());
    }

    #[test]
    fn test_firebase_config_debug_redacts_api_key() {
        let debug_output = format!("{:?}", firebase_config());

        assert!(debug_output.contains("shopfloor-test"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("AIzaSyTestOnlyKey0123456789"));
    }

    #[test]
    fn test_memory_backend_config_debug_redacts_password() {
        let config = MemoryBackendConfig {
            admin_email: Email::parse("owner@example.com").unwrap(),
            admin_password: SecretString::from("hunter2-but-longer"),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("owner@example.com"));
        assert!(!debug_output.contains("hunter2-but-longer"));
    }
}
