use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::errors::{redact_query, CoreError};

/// A single outbound GET request. The URL already carries its (canonical,
/// possibly signed) query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Look up a header value by (case-insensitive) name.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Raw response: status code and body text. Status handling is left to the
/// caller so each venue can classify its own error payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx response into `CoreError::Http` (429 becomes `RateLimited`).
    pub fn error_for_status(self, provider: &str) -> Result<Self, CoreError> {
        if self.is_success() {
            return Ok(self);
        }
        if self.status == 429 {
            return Err(CoreError::RateLimited {
                provider: provider.to_string(),
            });
        }
        let message: String = self.body.trim().chars().take(200).collect();
        Err(CoreError::Http {
            provider: provider.to_string(),
            status: self.status,
            message,
        })
    }

    /// Deserialize the body, attributing parse failures to the provider.
    pub fn json<T: DeserializeOwned>(&self, provider: &str) -> Result<T, CoreError> {
        serde_json::from_str(&self.body).map_err(|e| CoreError::Api {
            provider: provider.to_string(),
            message: format!("Malformed response payload: {e}"),
        })
    }
}

/// Seam between the venue clients and the network.
///
/// Production code uses [`ReqwestTransport`]; tests substitute a scripted
/// implementation to count calls and inject failures.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, request: HttpRequest) -> Result<HttpResponse, CoreError>;
}

/// reqwest-backed transport. One instance owns one connection pool; share it
/// (via `Arc`) between every client talking to the same venues.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build a pooled client where every call is bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, CoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| CoreError::Network(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, request: HttpRequest) -> Result<HttpResponse, CoreError> {
        let mut builder = self.client.get(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        log::debug!("GET {}", redact_query(&request.url));
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpResponse { status, body })
    }
}
