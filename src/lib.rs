//! Portal session - client-side session and token lifecycle for the portal REST API
//!
//! This is the library interface: create a [`SessionManager`] at startup,
//! [`bootstrap`](SessionManager::bootstrap) it, and hand clones (or its
//! [`ApiClient`]) to whatever needs to talk to the API.

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod http;

pub use auth::{BootstrapOutcome, Session, SessionEvent, SessionManager, UserProfile};
pub use config::Config;
pub use error::{Error, ErrorKind};
pub use http::ApiClient;
