//! Session gate: one navigation decision per page load.
//!
//! The identity provider reports session state as a stream that may repeat
//! itself. A gate latches on the first observation and ignores the rest, so
//! a page is never redirected twice.

use futures::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::backend::{AuthError, AuthSession, SessionState};

/// Pages protected by a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    /// Login form.
    Login,
    /// Product dashboard.
    Dashboard,
}

impl Page {
    /// Path the page is served from.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Login => "/auth/login",
            Self::Dashboard => "/",
        }
    }
}

/// What to do with the current page load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Render the page. Carries the admin's session on the dashboard.
    Proceed(Option<AuthSession>),
    /// Send the browser elsewhere.
    Redirect(Page),
    /// No decision could be made; leave the user where they are.
    Stay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    Pending,
    Decided,
}

/// Latching gate for a single page load.
#[derive(Debug)]
pub struct SessionGate {
    page: Page,
    state: GateState,
}

impl SessionGate {
    /// A pending gate for `page`.
    #[must_use]
    pub const fn new(page: Page) -> Self {
        Self {
            page,
            state: GateState::Pending,
        }
    }

    /// Whether a decision has already been made.
    #[must_use]
    pub fn is_decided(&self) -> bool {
        self.state == GateState::Decided
    }

    /// Feed one observed session state.
    ///
    /// Returns the decision on the first call and `None` on every later one.
    pub fn observe(&mut self, session: &SessionState) -> Option<GateDecision> {
        if self.is_decided() {
            return None;
        }
        self.state = GateState::Decided;

        let decision = match (self.page, session) {
            (Page::Login, SessionState::SignedIn(_)) => GateDecision::Redirect(Page::Dashboard),
            (Page::Login, SessionState::SignedOut) => GateDecision::Proceed(None),
            (Page::Dashboard, SessionState::SignedIn(auth)) => {
                GateDecision::Proceed(Some(auth.clone()))
            }
            (Page::Dashboard, SessionState::SignedOut) => GateDecision::Redirect(Page::Login),
        };
        debug!(page = ?self.page, ?decision, "Session gate decided");
        Some(decision)
    }

    /// Drive the gate from a session-change stream and return its decision.
    ///
    /// A stream error, or a stream that ends before reporting any state,
    /// yields [`GateDecision::Stay`].
    pub async fn run<S>(mut self, changes: S) -> GateDecision
    where
        S: Stream<Item = Result<SessionState, AuthError>> + Send,
    {
        let mut changes = std::pin::pin!(changes);
        while let Some(change) = changes.next().await {
            match change {
                Ok(session) => {
                    if let Some(decision) = self.observe(&session) {
                        return decision;
                    }
                }
                Err(err) => {
                    warn!(page = ?self.page, error = %err, "Session observer failed");
                    return GateDecision::Stay;
                }
            }
        }
        GateDecision::Stay
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, Utc};
    use futures::stream;

    use shopfloor_core::Email;

    use super::*;
    use crate::backend::AuthErrorKind;

    fn session() -> AuthSession {
        AuthSession {
            uid: "uid-1".to_string(),
            email: Email::parse("admin@example.com").unwrap(),
            id_token: "id".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
        }
    }

    #[test]
    fn test_decision_table() {
        let signed_in = SessionState::SignedIn(session());

        assert_eq!(
            SessionGate::new(Page::Login).observe(&signed_in),
            Some(GateDecision::Redirect(Page::Dashboard))
        );
        assert_eq!(
            SessionGate::new(Page::Login).observe(&SessionState::SignedOut),
            Some(GateDecision::Proceed(None))
        );
        assert_eq!(
            SessionGate::new(Page::Dashboard).observe(&signed_in),
            Some(GateDecision::Proceed(Some(session())))
        );
        assert_eq!(
            SessionGate::new(Page::Dashboard).observe(&SessionState::SignedOut),
            Some(GateDecision::Redirect(Page::Login))
        );
    }

    #[test]
    fn test_gate_decides_once() {
        let mut gate = SessionGate::new(Page::Dashboard);
        assert!(gate.observe(&SessionState::SignedOut).is_some());
        assert!(gate.is_decided());
        assert_eq!(gate.observe(&SessionState::SignedOut), None);
        assert_eq!(gate.observe(&SessionState::SignedIn(session())), None);
    }

    #[tokio::test]
    async fn test_run_takes_first_state_of_repeating_stream() {
        let changes = stream::iter(vec![
            Ok(SessionState::SignedOut),
            Ok(SessionState::SignedOut),
            Ok(SessionState::SignedIn(session())),
        ]);
        assert_eq!(
            SessionGate::new(Page::Dashboard).run(changes).await,
            GateDecision::Redirect(Page::Login)
        );
    }

    #[tokio::test]
    async fn test_run_stays_on_error_or_silence() {
        let failing = stream::iter(vec![Err(AuthError::new(
            AuthErrorKind::NetworkRequestFailed,
            "offline",
        ))]);
        assert_eq!(
            SessionGate::new(Page::Login).run(failing).await,
            GateDecision::Stay
        );

        let silent = stream::iter(Vec::<Result<SessionState, AuthError>>::new());
        assert_eq!(
            SessionGate::new(Page::Dashboard).run(silent).await,
            GateDecision::Stay
        );
    }
}
