//! API client for the rest of the application
//!
//! Screens issue their requests through this client so that every call
//! carries the session's bearer token and goes through the refresh
//! interceptor.

use crate::auth::SessionManager;
use crate::error::{Error, Result};
use crate::http::envelope::failure_message;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};

#[derive(Clone)]
pub struct ApiClient {
    session: SessionManager,
}

impl ApiClient {
    pub(crate) fn new(session: SessionManager) -> Self {
        Self { session }
    }

    /// Start a request against the configured API base URL
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.session.transport().request(method, path)
    }

    /// Send a request through the refresh interceptor. Non-success statuses
    /// other than an unrecoverable 401 come back as a normal response.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let request = builder.build()?;
        self.session.execute(request).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(self.request(Method::GET, path)).await?;
        handle_json_response(response).await
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self.send(self.request(Method::POST, path).json(body)).await?;
        handle_json_response(response).await
    }

    pub async fn put_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self.send(self.request(Method::PUT, path).json(body)).await?;
        handle_json_response(response).await
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        let response = self.send(self.request(Method::DELETE, path)).await?;
        handle_empty_response(response).await
    }
}

/// Parses JSON responses and surfaces HTTP errors with sanitized bodies.
pub async fn handle_json_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    if response.status().is_success() {
        response
            .json::<T>()
            .await
            .map_err(|e| Error::Server(format!("Failed to decode response: {}", e)))
    } else {
        Err(error_from_response(response).await)
    }
}

/// Handles empty responses and returns sanitized HTTP errors when needed.
pub async fn handle_empty_response(response: Response) -> Result<()> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(error_from_response(response).await)
    }
}

pub async fn error_from_response(response: Response) -> Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Error::Http {
        status: status.as_u16(),
        message: failure_message(&body).unwrap_or_else(|| default_reason(status)),
    }
}

fn default_reason(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("Request failed.")
        .to_string()
}
