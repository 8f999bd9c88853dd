//! HTTP transport for upstream registries
//!
//! One [`Transport`] instance wraps one upstream base URL. The trait exists
//! so the retry/breaker machinery and the aggregator can be exercised in
//! tests without a network.

use crate::config::get_http_timeout_secs;
use crate::registry::error::FetchError;
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde_json::Value;
use std::time::Duration;

/// A single upstream endpoint reachable over HTTP.
///
/// Implementations must never panic on network or HTTP failures; every
/// failure is classified into a [`FetchError`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `endpoint` (relative to the transport's base URL) with query
    /// parameters, expecting a JSON body.
    async fn get_json(
        &self,
        endpoint: &str,
        params: &[(String, String)],
    ) -> Result<Value, FetchError>;

    /// POST a JSON body to `endpoint`, expecting a JSON body back.
    async fn post_json(&self, endpoint: &str, body: &Value) -> Result<Value, FetchError>;
}

/// Creates an HTTP client configured with the standard registry timeout.
///
/// Uses `HTTP_TIMEOUT_SECS` environment variable or the built-in default.
/// This prevents infinite hangs when an upstream is slow or unresponsive.
#[must_use]
pub fn create_http_client() -> HttpClient {
    let timeout = Duration::from_secs(get_http_timeout_secs());
    HttpClient::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| HttpClient::new())
}

/// reqwest-backed [`Transport`] for one upstream base URL
pub struct HttpTransport {
    client: HttpClient,
    base_url: String,
    auth_header: Option<String>,
}

impl HttpTransport {
    /// Create a transport for `base_url` with no authorization header
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: create_http_client(),
            base_url: base_url.into(),
            auth_header: None,
        }
    }

    /// Create a transport that sends `Authorization: <value>` on every request
    #[must_use]
    pub fn with_auth(base_url: impl Into<String>, auth_value: impl Into<String>) -> Self {
        Self {
            client: create_http_client(),
            base_url: base_url.into(),
            auth_header: Some(auth_value.into()),
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint)
    }

    fn classify(error: &reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Network(error.to_string())
        }
    }

    async fn read_json(response: reqwest::Response) -> Result<Value, FetchError> {
        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(FetchError::RateLimited { retry_after });
        }
        if status.is_server_error() {
            return Err(FetchError::Upstream(status.as_u16()));
        }
        if !status.is_success() {
            return Err(FetchError::Rejected(status.as_u16()));
        }
        response
            .json()
            .await
            .map_err(|e| FetchError::Network(format!("invalid JSON body: {e}")))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(
        &self,
        endpoint: &str,
        params: &[(String, String)],
    ) -> Result<Value, FetchError> {
        let mut request = self.client.get(self.url(endpoint)).query(params);
        if let Some(auth) = &self.auth_header {
            request = request.header(reqwest::header::AUTHORIZATION, auth);
        }
        let response = request.send().await.map_err(|e| Self::classify(&e))?;
        Self::read_json(response).await
    }

    async fn post_json(&self, endpoint: &str, body: &Value) -> Result<Value, FetchError> {
        let mut request = self.client.post(self.url(endpoint)).json(body);
        if let Some(auth) = &self.auth_header {
            request = request.header(reqwest::header::AUTHORIZATION, auth);
        }
        let response = request.send().await.map_err(|e| Self::classify(&e))?;
        Self::read_json(response).await
    }
}
