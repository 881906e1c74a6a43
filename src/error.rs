//! Error types for the portal session manager

use std::fmt;
use thiserror::Error;

/// Coarse classification of an [`Error`], used by callers to branch without
/// matching on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or malformed input, caught before or by the server
    ValidationFailure,
    /// The server rejected the submitted credentials
    InvalidCredentials,
    /// The server rejected a bearer, refresh or reset token
    InvalidToken,
    /// No response was received
    NetworkFailure,
    /// 5xx response or a malformed envelope
    ServerFailure,
    /// The refresh interceptor gave up and forced a logout
    RefreshExhausted,
    /// Local configuration, storage or serialization problem
    Local,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::ValidationFailure => "validation_failure",
            ErrorKind::InvalidCredentials => "invalid_credentials",
            ErrorKind::InvalidToken => "invalid_token",
            ErrorKind::NetworkFailure => "network_failure",
            ErrorKind::ServerFailure => "server_failure",
            ErrorKind::RefreshExhausted => "refresh_exhausted",
            ErrorKind::Local => "local",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    InvalidCredentials(String),

    #[error("{0}")]
    InvalidToken(String),

    #[error("Unable to reach the server: {0}")]
    Network(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Session expired ({status}): {message}")]
    RefreshExhausted { status: u16, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Config file not found. Run 'portal-session init' first.")]
    ConfigNotFound,

    #[error("Token storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Request failed ({status}): {message}")]
    Http { status: u16, message: String },

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::ValidationFailure,
            Error::InvalidCredentials(_) => ErrorKind::InvalidCredentials,
            Error::InvalidToken(_) => ErrorKind::InvalidToken,
            Error::Network(_) => ErrorKind::NetworkFailure,
            Error::Server(_) => ErrorKind::ServerFailure,
            Error::RefreshExhausted { .. } => ErrorKind::RefreshExhausted,
            Error::Http { status, .. } if *status >= 500 => ErrorKind::ServerFailure,
            Error::Http { status: 401 | 403, .. } => ErrorKind::InvalidToken,
            Error::Http { .. } => ErrorKind::ValidationFailure,
            Error::Config(_)
            | Error::ConfigNotFound
            | Error::Storage(_)
            | Error::Io(_)
            | Error::TomlParse(_)
            | Error::Json(_)
            | Error::Other(_) => ErrorKind::Local,
        }
    }

    /// Build an error of the given kind carrying a human-readable message
    pub fn with_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::ValidationFailure => Error::Validation(message),
            ErrorKind::InvalidCredentials => Error::InvalidCredentials(message),
            ErrorKind::InvalidToken => Error::InvalidToken(message),
            ErrorKind::NetworkFailure => Error::Network(message),
            ErrorKind::ServerFailure => Error::Server(message),
            ErrorKind::RefreshExhausted => Error::RefreshExhausted {
                status: 401,
                message,
            },
            ErrorKind::Local => Error::Other(message),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Error::Server(format!("Failed to decode response: {}", err))
        } else if err.is_builder() {
            Error::Other(format!("Failed to build request: {}", err))
        } else {
            Error::Network(err.to_string())
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
