//! Response envelope convention
//!
//! The auth endpoints answer with
//! `{ success, message?, user?, accessToken?, refreshToken? }`. A body without
//! `success: true` is a failure even on HTTP 200.

use crate::auth::models::{TokenPair, UserProfile};
use crate::error::{Error, ErrorKind, Result};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};

/// Maximum number of error body characters surfaced to callers.
const MAX_ERROR_CHARS: usize = 200;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl Envelope {
    /// Split a login/register answer into the user and a complete token pair
    pub fn into_session(self) -> Result<(UserProfile, TokenPair)> {
        let access_token = non_empty(self.access_token);
        let refresh_token = non_empty(self.refresh_token);
        match (self.user, access_token, refresh_token) {
            (Some(user), Some(access_token), Some(refresh_token)) => Ok((
                user,
                TokenPair {
                    access_token,
                    refresh_token,
                },
            )),
            _ => Err(Error::Server(
                "Response is missing the user or tokens".to_string(),
            )),
        }
    }

    pub fn into_user(self) -> Result<UserProfile> {
        self.user
            .ok_or_else(|| Error::Server("Response is missing the user".to_string()))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Error kind for an unsuccessful HTTP status. `rejection` is what the
/// calling operation calls a refusal (bad credentials, bad token, ...).
pub fn status_kind(status: StatusCode, rejection: ErrorKind) -> ErrorKind {
    match status.as_u16() {
        400 | 409 | 422 => ErrorKind::ValidationFailure,
        401 | 403 | 404 => rejection,
        s if s >= 500 => ErrorKind::ServerFailure,
        _ => rejection,
    }
}

/// Read a response as an envelope, turning every kind of failure into an error
pub async fn read_envelope(
    response: Response,
    rejection: ErrorKind,
    fallback: &str,
) -> Result<Envelope> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| Error::Network(e.to_string()))?;
    parse_envelope(status, &body, rejection, fallback)
}

pub fn parse_envelope(
    status: StatusCode,
    body: &str,
    rejection: ErrorKind,
    fallback: &str,
) -> Result<Envelope> {
    let parsed = serde_json::from_str::<Envelope>(body);

    if status.is_success() {
        return match parsed {
            Ok(envelope) if envelope.success => Ok(envelope),
            Ok(envelope) => Err(Error::with_kind(
                rejection,
                envelope.message.unwrap_or_else(|| fallback.to_string()),
            )),
            Err(_) => Err(Error::Server("Malformed response from server".to_string())),
        };
    }

    let message = parsed
        .ok()
        .and_then(|envelope| envelope.message)
        .or_else(|| sanitize_body(body))
        .unwrap_or_else(|| fallback.to_string());
    Err(Error::with_kind(status_kind(status, rejection), message))
}

/// Message carried by an error body: the envelope message when there is one,
/// otherwise the trimmed and truncated raw body.
pub fn failure_message(body: &str) -> Option<String> {
    serde_json::from_str::<Envelope>(body)
        .ok()
        .and_then(|envelope| envelope.message)
        .or_else(|| sanitize_body(body))
}

/// Sanitizes HTTP error bodies for user-facing messages by trimming and truncating.
fn sanitize_body(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.chars().take(MAX_ERROR_CHARS).collect())
    }
}
