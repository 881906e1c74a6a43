//! Startup session restore

use crate::auth::endpoints;
use crate::auth::models::UserProfile;
use crate::auth::storage;
use crate::auth::SessionManager;
use crate::error::{ErrorKind, Result};
use crate::http::envelope::read_envelope;
use reqwest::Method;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum BootstrapOutcome {
    /// Nothing persisted; no request was made
    NoStoredSession,
    /// The stored token was accepted and the profile loaded
    Restored(UserProfile),
    /// The stored tokens were refused or unreachable and have been cleared
    Discarded { kind: ErrorKind, message: String },
}

impl SessionManager {
    /// Restore the session from persisted tokens.
    ///
    /// Runs once per manager; later calls return the first outcome. Never
    /// refreshes: a refused token just ends the session.
    pub async fn bootstrap(&self) -> BootstrapOutcome {
        self.inner
            .bootstrap
            .get_or_init(|| self.resolve_bootstrap())
            .await
            .clone()
    }

    async fn resolve_bootstrap(&self) -> BootstrapOutcome {
        let stored = storage::load_tokens(self.inner.store.as_ref()).unwrap_or_else(|e| {
            warn!("Could not read stored tokens: {}", e);
            None
        });

        let Some(tokens) = stored else {
            // Drop any half-written pair so both tokens stay in step.
            if let Err(e) = storage::clear_tokens(self.inner.store.as_ref()) {
                warn!("Failed to clear stored tokens: {}", e);
            }
            self.inner.session.finish_operation();
            return BootstrapOutcome::NoStoredSession;
        };

        self.inner.transport.set_bearer(Some(&tokens.access_token));
        match self.fetch_profile().await {
            Ok(user) => {
                info!(user_id = %user.id, "Session restored");
                let _guard = self.inner.transitions();
                self.inner.session.establish(user.clone(), tokens);
                BootstrapOutcome::Restored(user)
            }
            Err(e) => {
                warn!(kind = %e.kind(), "Discarding stored session: {}", e);
                let (_, stored) = self.end_session();
                if let Err(e) = stored {
                    warn!("Failed to clear stored tokens: {}", e);
                }
                BootstrapOutcome::Discarded {
                    kind: e.kind(),
                    message: e.to_string(),
                }
            }
        }
    }

    /// Profile request sent directly, without the refresh interceptor
    async fn fetch_profile(&self) -> Result<UserProfile> {
        let request = self
            .inner
            .transport
            .request(Method::GET, endpoints::PROFILE)
            .build()?;
        let response = self.inner.transport.dispatch(request).await?;
        read_envelope(response, ErrorKind::InvalidToken, "Could not load profile")
            .await?
            .into_user()
    }
}
