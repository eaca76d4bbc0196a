//! HTTP seam between the API client and the network.

use std::time::Duration;

use async_trait::async_trait;

use crate::types::errors::ApiError;

/// A completed HTTP exchange, whatever its status.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: String,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for issuing GET requests.
///
/// Transport failures are reported as [`ApiError::Network`] or
/// [`ApiError::Timeout`]; any status code comes back as a response.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse, ApiError>;
}

/// Transport backed by a shared `reqwest` client.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("pinmark/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// The URL carries the auth token, so it is dropped from the message.
    fn map_send_error(err: reqwest::Error) -> ApiError {
        let err = err.without_url();
        if err.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Network(format!("failed to fetch: {err}"))
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, ApiError> {
        let resp = self
            .client
            .get(url)
            .header("Accept", "application/xml")
            .send()
            .await
            .map_err(Self::map_send_error)?;

        let status = resp.status();
        let reason = status.canonical_reason().unwrap_or_default().to_string();
        let body = resp.text().await.map_err(Self::map_send_error)?;

        Ok(HttpResponse {
            status: status.as_u16(),
            reason,
            body,
        })
    }
}
