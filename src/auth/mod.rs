//! Authentication and session management

pub mod bootstrap;
mod credentials;
pub mod endpoints;
pub mod events;
pub mod interceptor;
pub mod jwt;
mod manager;
pub mod models;
pub mod session;
pub mod storage;

pub use bootstrap::BootstrapOutcome;
pub use events::{Navigation, SessionEvent};
pub use jwt::{inspect_token, AccessClaims};
pub use manager::SessionManager;
pub use models::{RegistrationForm, TokenPair, UserProfile};
pub use session::Session;
pub use storage::{FileTokenStore, MemoryTokenStore, TokenStore};
