//! HTTP client for the auth endpoints.
//!
//! This module provides `HttpAuthApi`, the reqwest implementation of
//! [`AuthApi`](super::AuthApi).

use std::time::Duration;

use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::{ApiError, AuthApi};
use crate::models::{Credentials, Envelope, LoginResult};

// ============================================================================
// Constants
// ============================================================================

/// Header carrying the session token on authenticated requests.
pub const TOKEN_HEADER: &str = "Access-Token";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

const LOGIN_PATH: &str = "/auth/login";
const INFO_PATH: &str = "/user/info";
const LOGOUT_PATH: &str = "/auth/logout";

/// Auth API client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpAuthApi {
    client: Client,
    base_url: String,
}

impl HttpAuthApi {
    /// Create a new client against `base_url` (e.g. `https://example.com/api`).
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self::with_client(client, base_url))
    }

    /// Create a client sharing an existing connection pool.
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Read the `{ "result": ... }` envelope from a successful response.
    async fn read_result<T: DeserializeOwned>(
        response: reqwest::Response,
        url: &str,
    ) -> Result<T, ApiError> {
        let text = response.text().await?;
        let envelope: Envelope<T> = serde_json::from_str(&text).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse response from {}: {}", url, e))
        })?;
        Ok(envelope.result)
    }
}

impl AuthApi for HttpAuthApi {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResult, ApiError> {
        let url = self.url(LOGIN_PATH);
        debug!(url = %url, username = %credentials.username, "Sending login request");

        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .json(credentials)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        Self::read_result(response, &url).await
    }

    async fn get_info(&self, token: &str) -> Result<Value, ApiError> {
        let url = self.url(INFO_PATH);
        debug!(url = %url, "Fetching user info");

        let response = self
            .client
            .get(&url)
            .header(header::ACCEPT, "application/json")
            .header(TOKEN_HEADER, token)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        Self::read_result(response, &url).await
    }

    async fn logout(&self, token: &str) -> Result<(), ApiError> {
        let url = self.url(LOGOUT_PATH);
        debug!(url = %url, "Sending logout request");

        let response = self
            .client
            .post(&url)
            .header(TOKEN_HEADER, token)
            .send()
            .await?;

        Self::check_response(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let api = HttpAuthApi::with_client(Client::new(), "https://example.com/api/");
        assert_eq!(api.base_url(), "https://example.com/api");
        assert_eq!(api.url(LOGIN_PATH), "https://example.com/api/auth/login");
        assert_eq!(api.url(INFO_PATH), "https://example.com/api/user/info");
    }
}
