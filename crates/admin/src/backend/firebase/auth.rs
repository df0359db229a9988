//! Identity Toolkit sign-in and lookup, Secure Token refresh.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::Response;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use url::Url;

use shopfloor_core::Email;

use super::{ApiErrorBody, FirebaseBackend, endpoint};
use crate::backend::{
    AuthError, AuthErrorKind, AuthSession, IdentityProvider, SessionChanges, SessionState,
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    email: String,
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest<'a> {
    id_token: &'a str,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    #[serde(default)]
    disabled: bool,
}

#[derive(Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
    user_id: String,
}

/// Token lifetime, reported by the APIs as a decimal string of seconds.
fn parse_expires_in(raw: &str) -> Result<Duration, AuthError> {
    raw.parse::<i64>()
        .map(Duration::seconds)
        .map_err(|e| AuthError::new(AuthErrorKind::Other(raw.to_string()), e.to_string()))
}

async fn auth_error_from_response(response: Response) -> AuthError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ApiErrorBody>(&body) {
        Ok(parsed) => AuthError::new(
            AuthErrorKind::from_code(&parsed.error.message),
            parsed.error.message,
        ),
        Err(_) => AuthError::new(
            AuthErrorKind::Other(status.to_string()),
            format!("{status}: {body}"),
        ),
    }
}

impl FirebaseBackend {
    fn keyed(&self, base: &Url, path: &str) -> Result<Url, AuthError> {
        let mut url = endpoint(base, path)
            .map_err(|e| AuthError::new(AuthErrorKind::Other("bad-endpoint".to_string()), e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("key", self.config.api_key.expose_secret());
        Ok(url)
    }

    /// Check that the session's account still exists and is enabled.
    ///
    /// # Errors
    ///
    /// Returns [`AuthErrorKind::TokenExpired`] or
    /// [`AuthErrorKind::UserNotFound`] if the token no longer identifies an
    /// account, or a network error if the endpoint is unreachable.
    #[instrument(skip(self, session), fields(uid = %session.uid))]
    pub async fn lookup(&self, session: &AuthSession) -> Result<bool, AuthError> {
        let url = self.keyed(&self.config.identity_url, "accounts:lookup")?;

        let response = self
            .client
            .post(url)
            .json(&LookupRequest {
                id_token: &session.id_token,
            })
            .send()
            .await
            .map_err(|e| AuthError::network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(auth_error_from_response(response).await);
        }

        let body: LookupResponse = response
            .json()
            .await
            .map_err(|e| AuthError::network(e.to_string()))?;

        Ok(body
            .users
            .iter()
            .any(|user| user.local_id == session.uid && !user.disabled))
    }

    /// Resolve the current state of a stored session, refreshing its ID
    /// token when it is about to expire.
    async fn current_state(&self, session: AuthSession) -> Result<SessionState, AuthError> {
        let session = if session.needs_refresh(Utc::now()) {
            self.refresh(&session).await?
        } else {
            session
        };
        if self.lookup(&session).await? {
            Ok(SessionState::SignedIn(session))
        } else {
            Ok(SessionState::SignedOut)
        }
    }

    /// Exchange a refresh token for a new ID token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthErrorKind::TokenExpired`] if the refresh token was
    /// revoked, or a network error if the endpoint is unreachable.
    #[instrument(skip(self, session), fields(uid = %session.uid))]
    pub async fn refresh(&self, session: &AuthSession) -> Result<AuthSession, AuthError> {
        let mut url = self.config.token_url.clone();
        url.query_pairs_mut()
            .append_pair("key", self.config.api_key.expose_secret());

        let response = self
            .client
            .post(url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", session.refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AuthError::network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(auth_error_from_response(response).await);
        }

        let refreshed: RefreshResponse = response
            .json()
            .await
            .map_err(|e| AuthError::network(e.to_string()))?;

        debug!("ID token refreshed");

        Ok(AuthSession {
            uid: refreshed.user_id,
            email: session.email.clone(),
            id_token: refreshed.id_token,
            refresh_token: refreshed.refresh_token,
            expires_at: Utc::now() + parse_expires_in(&refreshed.expires_in)?,
        })
    }
}

#[async_trait]
impl IdentityProvider for FirebaseBackend {
    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_in(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthSession, AuthError> {
        let url = self.keyed(&self.config.identity_url, "accounts:signInWithPassword")?;
        let request = SignInRequest {
            email: email.as_str(),
            password: password.expose_secret(),
            return_secure_token: true,
        };

        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AuthError::network(e.to_string()))?;

        if !response.status().is_success() {
            let err = auth_error_from_response(response).await;
            warn!(kind = ?err.kind, "Sign-in rejected");
            return Err(err);
        }

        let body: SignInResponse = response
            .json()
            .await
            .map_err(|e| AuthError::network(e.to_string()))?;

        let email = Email::parse(&body.email).unwrap_or_else(|_| email.clone());
        debug!(uid = %body.local_id, "Signed in");

        Ok(AuthSession {
            uid: body.local_id,
            email,
            id_token: body.id_token,
            refresh_token: body.refresh_token,
            expires_at: Utc::now() + parse_expires_in(&body.expires_in)?,
        })
    }

    #[instrument(skip(self, session), fields(uid = %session.uid))]
    async fn sign_out(&self, session: &AuthSession) -> Result<(), AuthError> {
        // ID tokens are bearer credentials with no revocation endpoint for
        // end users; dropping them from the session is the sign-out.
        debug!("Session discarded");
        Ok(())
    }

    fn session_changes(&self, current: Option<AuthSession>) -> SessionChanges {
        let backend = self.clone();

        Box::pin(async_stream::stream! {
            let Some(session) = current else {
                yield Ok(SessionState::SignedOut);
                return;
            };
            match backend.current_state(session).await {
                Ok(state) => yield Ok(state),
                Err(err) if err.kind == AuthErrorKind::NetworkRequestFailed => yield Err(err),
                Err(err) => {
                    debug!(kind = ?err.kind, "Stored session rejected");
                    yield Ok(SessionState::SignedOut);
                }
            }
        })
    }
}
