//! Configuration schema definitions

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub routes: RoutesConfig,
}

/// Remote REST API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL every endpoint path is joined onto
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    concat!("portal-session/", env!("CARGO_PKG_VERSION")).to_string()
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

/// Durable token storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// JSON file holding the persisted token pair
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("./.portal/session.json")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

/// Routes the navigation layer is sent to on session events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutesConfig {
    /// Landing route after login or registration
    #[serde(default = "default_authenticated_route")]
    pub authenticated: String,

    /// Unauthenticated entry point
    #[serde(default = "default_login_route")]
    pub login: String,
}

fn default_authenticated_route() -> String {
    "/dashboard".to_string()
}

fn default_login_route() -> String {
    "/login".to_string()
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            authenticated: default_authenticated_route(),
            login: default_login_route(),
        }
    }
}
