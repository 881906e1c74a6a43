//! Configuration loading and environment variable interpolation

use crate::error::{Error, Result};
use regex::Regex;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use super::Config;

pub const CONFIG_FILENAME: &str = "portal.toml";

/// Environment variable overriding `api.base_url`
pub const API_URL_ENV: &str = "PORTAL_API_URL";

/// Load configuration from portal.toml, falling back to defaults when no file exists
pub fn load_config() -> Result<Config> {
    let mut config = match find_config_file() {
        Ok(path) => load_config_from_path(&path)?,
        Err(Error::ConfigNotFound) => {
            tracing::debug!("No {} found, using defaults", CONFIG_FILENAME);
            Config::default()
        }
        Err(e) => return Err(e),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Load configuration from a specific path
pub fn load_config_from_path(path: &Path) -> Result<Config> {
    let raw = fs::read_to_string(path).map_err(|_| Error::ConfigNotFound)?;
    Ok(toml::from_str(&interpolate_env_vars(&raw))?)
}

/// Nearest portal.toml in the working directory or one of its parents
fn find_config_file() -> Result<PathBuf> {
    let cwd = env::current_dir().map_err(|e| Error::Config(e.to_string()))?;
    cwd.ancestors()
        .map(|dir| dir.join(CONFIG_FILENAME))
        .find(|candidate| candidate.is_file())
        .ok_or(Error::ConfigNotFound)
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(url) = env::var(API_URL_ENV) {
        if !url.trim().is_empty() {
            config.api.base_url = url.trim().to_string();
        }
    }
}

static ENV_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}").expect("static pattern")
});

/// Replace `${VAR}` and `${VAR:-fallback}` with values from the environment
fn interpolate_env_vars(content: &str) -> String {
    ENV_VAR
        .replace_all(content, |caps: &regex::Captures| {
            env::var(&caps[1])
                .unwrap_or_else(|_| caps.get(2).map_or("", |m| m.as_str()).to_string())
        })
        .into_owned()
}

/// Generate a default configuration file content
pub fn default_config_content() -> &'static str {
    r#"# Portal session configuration

[api]
base_url = "${PORTAL_API_URL:-http://localhost:5000}"
timeout_secs = 10

[storage]
# Persisted access/refresh token pair
path = "./.portal/session.json"

[routes]
authenticated = "/dashboard"
login = "/login"
"#
}
