//! Session store
//!
//! Holds the single in-memory session of a [`SessionManager`](crate::SessionManager).
//! Observers get a `watch` receiver and are woken when the user, the loading
//! flag or the last error change. Tokens are kept here too so they change in
//! the same step as the user, but they are not readable outside the crate.

use crate::auth::jwt::{inspect_token, token_expires_at};
use crate::auth::models::{TokenPair, UserProfile};
use chrono::{DateTime, Utc};
use std::fmt;
use tokio::sync::watch;

/// Current authentication state
#[derive(Clone, Default)]
pub struct Session {
    user: Option<UserProfile>,
    access_token: Option<String>,
    refresh_token: Option<String>,
    is_loading: bool,
    last_error: Option<String>,
}

impl Session {
    pub fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.access_token.is_some()
    }

    /// Expiry of the current access token, when it is a JWT
    pub fn access_token_expires_at(&self) -> Option<DateTime<Utc>> {
        self.access_token.as_deref().and_then(token_expires_at)
    }

    /// Whether the access token is a JWT already past its `exp` at `now`
    pub fn is_access_token_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.access_token
            .as_deref()
            .and_then(inspect_token)
            .is_some_and(|claims| claims.is_expired_at(now))
    }

    pub(crate) fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub(crate) fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    fn visible_eq(&self, other: &Session) -> bool {
        self.user == other.user
            && self.is_loading == other.is_loading
            && self.last_error == other.last_error
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("has_access_token", &self.access_token.is_some())
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("is_loading", &self.is_loading)
            .field("last_error", &self.last_error)
            .finish()
    }
}

/// Writer side of the session. Only the auth operations hold one.
pub(crate) struct SessionStore {
    tx: watch::Sender<Session>,
}

impl SessionStore {
    /// A fresh store starts loading until bootstrap resolves it
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Session {
            is_loading: true,
            ..Default::default()
        });
        Self { tx }
    }

    pub fn snapshot(&self) -> Session {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }

    /// Apply `change` and wake observers only if a visible field moved
    fn modify(&self, change: impl FnOnce(&mut Session)) {
        self.tx.send_if_modified(|session| {
            let before = session.clone();
            change(session);
            !before.visible_eq(session)
        });
    }

    pub fn begin_operation(&self) {
        self.modify(|s| {
            s.is_loading = true;
            s.last_error = None;
        });
    }

    pub fn finish_operation(&self) {
        self.modify(|s| s.is_loading = false);
    }

    pub fn fail_operation(&self, message: &str) {
        self.modify(|s| {
            s.is_loading = false;
            s.last_error = Some(message.to_string());
        });
    }

    /// Install a full session: user and both tokens at once
    pub fn establish(&self, user: UserProfile, tokens: TokenPair) {
        self.modify(|s| {
            s.user = Some(user);
            s.access_token = Some(tokens.access_token);
            s.refresh_token = Some(tokens.refresh_token);
            s.is_loading = false;
            s.last_error = None;
        });
    }

    /// Replace the access token (and a rotated refresh token) of the session
    /// that presented `presented`. Returns false, changing nothing, when that
    /// session is no longer the live one.
    pub fn rotate_tokens(
        &self,
        presented: &str,
        access_token: String,
        refresh_token: Option<String>,
    ) -> bool {
        let mut rotated = false;
        self.modify(|s| {
            if s.user.is_none() || s.refresh_token.as_deref() != Some(presented) {
                return;
            }
            s.access_token = Some(access_token);
            if let Some(refresh) = refresh_token {
                s.refresh_token = Some(refresh);
            }
            rotated = true;
        });
        rotated
    }

    pub fn replace_user(&self, user: UserProfile) {
        self.modify(|s| {
            if s.access_token.is_some() {
                s.user = Some(user);
            }
        });
    }

    /// Drop user and tokens. Returns whether there was anything to drop.
    pub fn clear(&self) -> bool {
        let mut had_session = false;
        self.modify(|s| {
            had_session =
                s.user.is_some() || s.access_token.is_some() || s.refresh_token.is_some();
            s.user = None;
            s.access_token = None;
            s.refresh_token = None;
            s.is_loading = false;
        });
        had_session
    }
}
