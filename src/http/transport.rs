//! Shared HTTP transport
//!
//! One `reqwest::Client` per session manager. The transport owns the base URL
//! and the process-wide default bearer header; it knows nothing about
//! refreshing tokens.

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method, Request, RequestBuilder, Response};
use std::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub struct HttpTransport {
    client: Client,
    base_url: String,
    bearer: RwLock<Option<HeaderValue>>,
}

impl HttpTransport {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            bearer: RwLock::new(None),
        })
    }

    /// Join `path` onto the configured base URL
    pub fn url(&self, path: &str) -> String {
        build_url_with_base(&self.base_url, path)
    }

    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path))
    }

    /// Set or remove the default `Authorization: Bearer` header
    pub fn set_bearer(&self, token: Option<&str>) {
        let value = token.and_then(|token| bearer_value(token).ok());
        match self.bearer.write() {
            Ok(mut bearer) => *bearer = value,
            Err(poisoned) => *poisoned.into_inner() = value,
        }
    }

    pub fn has_bearer(&self) -> bool {
        self.current_bearer().is_some()
    }

    fn current_bearer(&self) -> Option<HeaderValue> {
        match self.bearer.read() {
            Ok(bearer) => bearer.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Send a request as-is, adding the default bearer header when the
    /// request has none and tagging it with a fresh request id.
    pub async fn dispatch(&self, mut request: Request) -> Result<Response> {
        if !request.headers().contains_key(AUTHORIZATION) {
            if let Some(bearer) = self.current_bearer() {
                request.headers_mut().insert(AUTHORIZATION, bearer);
            }
        }

        let request_id = Uuid::new_v4().to_string();
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            request
                .headers_mut()
                .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
        }

        debug!(
            method = %request.method(),
            path = request.url().path(),
            request_id = %request_id,
            "dispatch"
        );

        let response = self.client.execute(request).await?;
        debug!(status = response.status().as_u16(), request_id = %request_id, "response");
        Ok(response)
    }
}

/// Build an `Authorization` header value for `token`
pub fn bearer_value(token: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|_| Error::InvalidToken("Token is not a valid header value".to_string()))?;
    value.set_sensitive(true);
    Ok(value)
}

/// Builds a URL from an explicit base URL and the provided path.
fn build_url_with_base(base_url: &str, path: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    let path = path.trim();

    if base.is_empty() {
        path.to_string()
    } else {
        format!("{}/{}", base, path.trim_start_matches('/'))
    }
}
