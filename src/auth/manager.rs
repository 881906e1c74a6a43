//! Session manager
//!
//! The one object the application creates at startup and hands to whatever
//! needs authentication. Cloning it is cheap and every clone shares the same
//! session, token storage and HTTP client.

use crate::auth::bootstrap::BootstrapOutcome;
use crate::auth::events::{EventHub, SessionEvent};
use crate::auth::models::UserProfile;
use crate::auth::session::{Session, SessionStore};
use crate::auth::storage::{self, FileTokenStore, TokenStore};
use crate::config::Config;
use crate::error::Result;
use crate::http::{ApiClient, HttpTransport};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, watch, OnceCell};
use tracing::{info, warn};

#[derive(Clone)]
pub struct SessionManager {
    pub(super) inner: Arc<Inner>,
}

pub(super) struct Inner {
    pub(super) transport: HttpTransport,
    pub(super) store: Arc<dyn TokenStore>,
    pub(super) session: SessionStore,
    pub(super) events: EventHub,
    pub(super) bootstrap: OnceCell<BootstrapOutcome>,
    transitions: Mutex<()>,
}

impl Inner {
    /// Serializes changes of who the session belongs to: establishing,
    /// ending and installing a refreshed token. Never held across `.await`.
    pub(super) fn transitions(&self) -> MutexGuard<'_, ()> {
        self.transitions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionManager {
    /// Create a manager using `store` for token persistence
    pub fn new(config: &Config, store: Arc<dyn TokenStore>) -> Result<Self> {
        Ok(Self {
            inner: Arc::new(Inner {
                transport: HttpTransport::new(&config.api)?,
                store,
                session: SessionStore::new(),
                events: EventHub::new(),
                bootstrap: OnceCell::new(),
                transitions: Mutex::new(()),
            }),
        })
    }

    /// Create a manager persisting tokens to the configured storage file
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = Arc::new(FileTokenStore::new(&config.storage.path));
        Self::new(config, store)
    }

    /// Current session state
    pub fn snapshot(&self) -> Session {
        self.inner.session.snapshot()
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.inner.session.snapshot().user().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.session.snapshot().is_authenticated()
    }

    /// Watch the session; woken when the user, loading flag or last error change
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.session.subscribe()
    }

    /// Receive lifecycle events (login, logout, expiry, ...)
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// HTTP client that routes through this session
    pub fn api(&self) -> ApiClient {
        ApiClient::new(self.clone())
    }

    pub(crate) fn transport(&self) -> &HttpTransport {
        &self.inner.transport
    }

    /// Clear user, tokens and bearer header together.
    ///
    /// Memory and the header are cleared even when storage fails. Returns
    /// whether any session state existed, plus the storage result.
    pub(super) fn end_session(&self) -> (bool, Result<()>) {
        let _guard = self.inner.transitions();
        let had_session = self.inner.session.clear();
        self.inner.transport.set_bearer(None);
        match storage::clear_tokens(self.inner.store.as_ref()) {
            Ok(had_tokens) => (had_session || had_tokens, Ok(())),
            Err(e) => (had_session, Err(e)),
        }
    }

    /// Forced logout after an unrecoverable authorization failure
    pub(super) fn expire(&self, reason: &str) {
        let (cleared, stored) = self.end_session();
        if let Err(e) = stored {
            warn!("Failed to clear stored tokens: {}", e);
        }
        if cleared {
            info!("Session expired, logging out");
            self.inner.events.emit(SessionEvent::SessionExpired {
                reason: reason.to_string(),
            });
        }
    }
}
