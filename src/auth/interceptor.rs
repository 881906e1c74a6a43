//! Token refresh interceptor
//!
//! Every request made through the shared client goes through
//! [`SessionManager::execute`]. A 401 triggers one refresh of the access
//! token and one replay of the request. If the refresh is impossible or the
//! replay is refused again, the session is expired and the caller gets
//! [`Error::RefreshExhausted`].
//!
//! Concurrent requests that fail together each refresh on their own; there is
//! no shared in-flight refresh. A refresh only lands in the session that
//! presented the refresh token: if the user logged out, or logged out and in
//! again, while it was in flight, the new access token is dropped.

use crate::auth::endpoints;
use crate::auth::events::SessionEvent;
use crate::auth::models::RefreshRequest;
use crate::auth::storage::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use crate::auth::SessionManager;
use crate::error::{Error, ErrorKind, Result};
use crate::http::envelope::{failure_message, read_envelope};
use crate::http::transport::bearer_value;
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, Request, Response, StatusCode};
use tracing::{debug, info, warn};

/// A request plus its "already retried" marker
pub(crate) struct RefreshAttempt {
    request: Request,
    retried: bool,
}

impl RefreshAttempt {
    fn new(request: Request) -> Self {
        Self {
            request,
            retried: false,
        }
    }

    /// Copy of the request to put on the wire, keeping the original for a replay
    fn next_dispatch(&self) -> Result<Request> {
        self.request
            .try_clone()
            .ok_or_else(|| Error::Other("Request body cannot be replayed".to_string()))
    }

    /// Point the request at a freshly issued access token
    fn authorize(&mut self, access_token: &str) -> Result<()> {
        self.request
            .headers_mut()
            .insert(AUTHORIZATION, bearer_value(access_token)?);
        Ok(())
    }
}

pub fn is_authorization_failure(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED
}

/// What a refresh exchange ended up doing
pub(crate) enum Refreshed {
    /// The session was updated with this access token
    Token(String),
    /// The session that asked for the refresh is gone
    Superseded,
}

/// Status and server message of an authorization failure
async fn refusal(response: Response) -> (StatusCode, String) {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = failure_message(&body).unwrap_or_else(|| "Unauthorized".to_string());
    (status, message)
}

impl SessionManager {
    /// Send `request` with the session's credentials, refreshing once on 401.
    ///
    /// Responses other than an authorization failure are returned unchanged,
    /// whatever their status.
    pub async fn execute(&self, request: Request) -> Result<Response> {
        if request.try_clone().is_none() {
            return self.execute_once(request).await;
        }

        let mut attempt = RefreshAttempt::new(request);
        loop {
            let response = self.inner.transport.dispatch(attempt.next_dispatch()?).await?;
            if !is_authorization_failure(response.status()) {
                return Ok(response);
            }
            let (status, message) = refusal(response).await;

            if attempt.retried {
                warn!(path = attempt.request.url().path(), "Request refused after refresh");
                self.expire(&message);
                return Err(Error::RefreshExhausted {
                    status: status.as_u16(),
                    message,
                });
            }

            attempt.retried = true;
            debug!(path = attempt.request.url().path(), "Access token refused, refreshing");

            match self.refresh_access_token().await {
                Ok(Refreshed::Token(access_token)) => attempt.authorize(&access_token)?,
                Ok(Refreshed::Superseded) => {
                    let current = self.inner.session.snapshot();
                    match current.access_token() {
                        Some(access_token) => {
                            debug!("Session replaced during refresh, replaying with its token");
                            attempt.authorize(access_token)?;
                        }
                        None => {
                            return Err(Error::RefreshExhausted {
                                status: status.as_u16(),
                                message: "Session ended during token refresh".to_string(),
                            })
                        }
                    }
                }
                Err(e) => {
                    warn!(kind = %e.kind(), "Token refresh failed: {}", e);
                    self.expire(&e.to_string());
                    return Err(Error::RefreshExhausted {
                        status: status.as_u16(),
                        message,
                    });
                }
            }
        }
    }

    /// Requests with a streaming body go out once. A 401 still refreshes the
    /// session, or ends it when the refresh fails, but the request itself is
    /// not replayed.
    async fn execute_once(&self, request: Request) -> Result<Response> {
        let path = request.url().path().to_string();
        let response = self.inner.transport.dispatch(request).await?;
        if !is_authorization_failure(response.status()) {
            return Ok(response);
        }
        let (status, message) = refusal(response).await;

        match self.refresh_access_token().await {
            Ok(_) => {
                debug!(path = %path, "Session refreshed, streaming request not replayed");
                Err(Error::InvalidToken(format!(
                    "{} (request body cannot be replayed, send it again)",
                    message
                )))
            }
            Err(e) => {
                warn!(kind = %e.kind(), "Token refresh failed: {}", e);
                self.expire(&e.to_string());
                Err(Error::RefreshExhausted {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }

    /// Exchange the stored refresh token for a new access token and install it
    /// in the session that presented it.
    pub(crate) async fn refresh_access_token(&self) -> Result<Refreshed> {
        let store = self.inner.store.as_ref();
        let refresh_token = store
            .get(REFRESH_TOKEN_KEY)?
            .ok_or_else(|| Error::InvalidToken("No refresh token stored".to_string()))?;
        if self.inner.session.snapshot().refresh_token() != Some(refresh_token.as_str()) {
            return Err(Error::InvalidToken("No live session to refresh".to_string()));
        }

        let request = self
            .inner
            .transport
            .request(Method::POST, endpoints::REFRESH_TOKEN)
            .json(&RefreshRequest {
                refresh_token: &refresh_token,
            })
            .build()?;
        let response = self.inner.transport.dispatch(request).await?;
        let envelope = read_envelope(response, ErrorKind::InvalidToken, "Token refresh failed").await?;

        let access_token = envelope
            .access_token
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| Error::Server("Refresh response has no access token".to_string()))?;
        let rotated = envelope
            .refresh_token
            .filter(|token| !token.trim().is_empty());

        let _guard = self.inner.transitions();
        let still_stored = store.get(REFRESH_TOKEN_KEY)?.as_deref() == Some(refresh_token.as_str());
        let still_live =
            self.inner.session.snapshot().refresh_token() == Some(refresh_token.as_str());
        if !still_stored || !still_live {
            info!("Session changed during token refresh, dropping the new token");
            return Ok(Refreshed::Superseded);
        }

        store.set(ACCESS_TOKEN_KEY, &access_token)?;
        if let Some(rotated) = &rotated {
            store.set(REFRESH_TOKEN_KEY, rotated)?;
        }
        self.inner.transport.set_bearer(Some(&access_token));
        self.inner
            .session
            .rotate_tokens(&refresh_token, access_token.clone(), rotated);

        info!("Access token refreshed");
        self.inner.events.emit(SessionEvent::TokenRefreshed);
        Ok(Refreshed::Token(access_token))
    }
}
