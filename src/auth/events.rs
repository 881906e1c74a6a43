//! Session lifecycle events
//!
//! The session manager never navigates. It publishes events here and the
//! routing layer decides where to go, typically through [`Navigation`].

use crate::auth::models::UserProfile;
use crate::config::RoutesConfig;
use tokio::sync::broadcast;
use tracing::trace;

const EVENT_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Login or registration succeeded
    Authenticated { user: UserProfile },
    /// The user logged out
    LoggedOut,
    /// The interceptor could not recover an authorization failure and logged out
    SessionExpired { reason: String },
    /// A password reset was confirmed; the user must log in again
    PasswordReset,
    /// The access token was silently replaced
    TokenRefreshed,
}

/// Fan-out of session events to any number of subscribers
#[derive(Clone)]
pub struct EventHub {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: SessionEvent) {
        trace!(?event, "session event");
        // Nobody listening is fine.
        let _ = self.tx.send(event);
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps session events to routes
#[derive(Debug, Clone)]
pub struct Navigation {
    authenticated: String,
    login: String,
}

impl Navigation {
    pub fn new(routes: &RoutesConfig) -> Self {
        Self {
            authenticated: routes.authenticated.clone(),
            login: routes.login.clone(),
        }
    }

    /// Route the UI should move to after `event`, if any
    pub fn route_for(&self, event: &SessionEvent) -> Option<&str> {
        match event {
            SessionEvent::Authenticated { .. } => Some(&self.authenticated),
            SessionEvent::LoggedOut
            | SessionEvent::SessionExpired { .. }
            | SessionEvent::PasswordReset => Some(&self.login),
            SessionEvent::TokenRefreshed => None,
        }
    }
}
