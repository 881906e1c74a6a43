//! Credential exchange: login, registration, logout and password reset

use crate::auth::endpoints;
use crate::auth::events::SessionEvent;
use crate::auth::models::{
    validate_email, ForgotPasswordRequest, LoginRequest, RegistrationForm, ResetPasswordRequest,
    UserProfile,
};
use crate::auth::storage;
use crate::auth::SessionManager;
use crate::error::{ErrorKind, Result};
use crate::http::envelope::read_envelope;
use crate::http::Envelope;
use reqwest::Method;
use serde::Serialize;
use std::future::Future;
use tracing::{info, warn};

impl SessionManager {
    /// Exchange email and password for a session
    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile> {
        let request = LoginRequest::new(email, password);
        let user = self
            .run_operation(async {
                request.validate()?;
                let envelope = self
                    .exchange(
                        endpoints::LOGIN,
                        &request,
                        ErrorKind::InvalidCredentials,
                        "Login failed",
                    )
                    .await?;
                self.establish(envelope)
            })
            .await
            .inspect_err(|e| warn!(kind = %e.kind(), "Login failed: {}", e))?;

        info!(user_id = %user.id, "Logged in");
        self.inner
            .events
            .emit(SessionEvent::Authenticated { user: user.clone() });
        Ok(user)
    }

    /// Create an account; a successful registration is also a login
    pub async fn register(&self, form: &RegistrationForm) -> Result<UserProfile> {
        let user = self
            .run_operation(async {
                form.validate()?;
                let envelope = self
                    .exchange(
                        endpoints::REGISTER,
                        form,
                        ErrorKind::ValidationFailure,
                        "Registration failed",
                    )
                    .await?;
                self.establish(envelope)
            })
            .await
            .inspect_err(|e| warn!(kind = %e.kind(), "Registration failed: {}", e))?;

        info!(user_id = %user.id, "Registered");
        self.inner
            .events
            .emit(SessionEvent::Authenticated { user: user.clone() });
        Ok(user)
    }

    /// End the session. Calling it again once logged out changes nothing.
    pub fn logout(&self) -> Result<()> {
        let (cleared, stored) = self.end_session();
        if cleared {
            info!("Logged out");
            self.inner.events.emit(SessionEvent::LoggedOut);
        }
        stored
    }

    /// Ask the server to send password reset instructions. Returns the server's message.
    pub async fn forgot_password(&self, email: &str) -> Result<String> {
        let request = ForgotPasswordRequest {
            email: email.trim().to_string(),
        };
        self.run_operation(async {
            validate_email(&request.email)?;
            let envelope = self
                .exchange(
                    endpoints::FORGOT_PASSWORD,
                    &request,
                    ErrorKind::ValidationFailure,
                    "Could not request a password reset",
                )
                .await?;
            Ok(envelope
                .message
                .unwrap_or_else(|| "Password reset instructions sent".to_string()))
        })
        .await
    }

    /// Confirm a password reset. Does not log in; the user signs in again
    /// with the new password.
    pub async fn reset_password(&self, reset_token: &str, new_password: &str) -> Result<String> {
        let request = ResetPasswordRequest {
            token: reset_token.trim().to_string(),
            password: new_password.to_string(),
        };
        let message = self
            .run_operation(async {
                request.validate()?;
                let envelope = self
                    .exchange(
                        endpoints::RESET_PASSWORD,
                        &request,
                        ErrorKind::InvalidToken,
                        "Password reset failed",
                    )
                    .await?;
                Ok(envelope
                    .message
                    .unwrap_or_else(|| "Password has been reset".to_string()))
            })
            .await?;

        info!("Password reset confirmed");
        self.inner.events.emit(SessionEvent::PasswordReset);
        Ok(message)
    }

    /// Re-fetch the profile through the interceptor and replace the cached user
    pub async fn refresh_profile(&self) -> Result<UserProfile> {
        let api = self.api();
        let response = api.send(api.request(Method::GET, endpoints::PROFILE)).await?;
        let user = read_envelope(response, ErrorKind::InvalidToken, "Could not load profile")
            .await?
            .into_user()?;
        self.inner.session.replace_user(user.clone());
        Ok(user)
    }

    /// Track `is_loading` and `last_error` around one operation
    async fn run_operation<T, F>(&self, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.inner.session.begin_operation();
        match operation.await {
            Ok(value) => {
                self.inner.session.finish_operation();
                Ok(value)
            }
            Err(e) => {
                self.inner.session.fail_operation(&e.to_string());
                Err(e)
            }
        }
    }

    /// POST `body` to an auth endpoint without going through the interceptor
    async fn exchange<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        rejection: ErrorKind,
        fallback: &str,
    ) -> Result<Envelope> {
        let request = self
            .inner
            .transport
            .request(Method::POST, path)
            .json(body)
            .build()?;
        let response = self.inner.transport.dispatch(request).await?;
        read_envelope(response, rejection, fallback).await
    }

    /// Persist tokens, set the bearer header and populate the user
    fn establish(&self, envelope: Envelope) -> Result<UserProfile> {
        let (user, tokens) = envelope.into_session()?;
        let _guard = self.inner.transitions();
        storage::save_tokens(self.inner.store.as_ref(), &tokens)?;
        self.inner.transport.set_bearer(Some(&tokens.access_token));
        self.inner.session.establish(user.clone(), tokens);
        Ok(user)
    }
}
