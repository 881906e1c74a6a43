//! Access token inspection
//!
//! The client never holds the signing key, so claims are read without
//! verifying the signature. They are only used to report expiry; the server
//! stays the authority on whether a token is accepted.

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Claims the client cares about. Everything else in the token is ignored.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct AccessClaims {
    /// Subject (user ID)
    #[serde(default)]
    pub sub: Option<String>,
    /// Issued at
    #[serde(default)]
    pub iat: Option<i64>,
    /// Expiration time
    #[serde(default)]
    pub exp: Option<i64>,
}

impl AccessClaims {
    /// Expiration as a timestamp, when the token carries one
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| Utc.timestamp_opt(exp, 0).single())
    }

    /// Check if the token is expired at `now`. Tokens without `exp` never expire here.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp.is_some_and(|exp| now.timestamp() >= exp)
    }
}

/// Decode the claims of a JWT access token. Returns `None` for opaque tokens.
pub fn inspect_token(token: &str) -> Option<AccessClaims> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<AccessClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .ok()
}

/// Expiration of an access token, if it is a JWT with an `exp` claim
pub fn token_expires_at(token: &str) -> Option<DateTime<Utc>> {
    inspect_token(token).and_then(|claims| claims.expires_at())
}
