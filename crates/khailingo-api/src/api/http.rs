//! HTTP transport abstraction for the backend API
//!
//! Requests and responses are plain data so the client's recovery logic can be
//! driven by a mock transport in tests.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Method;
use serde::de::DeserializeOwned;

/// Trait for executing HTTP requests
///
/// Implementations return every completed response as data, whatever its
/// status. `Err` is reserved for transport failures (DNS, connect, timeout).
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Executes a request and returns the raw response
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

/// A fully built request, ready to hand to a transport
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

/// Response from an HTTP request
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    /// Returns true if status is in 2xx range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns true if status is 401
    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    /// Returns true if status is 403
    pub fn is_forbidden(&self) -> bool {
        self.status == 403
    }

    /// Deserializes the body as JSON
    ///
    /// An empty body is read as `null`, which lets `204 No Content` decode
    /// into `()`, `Option<T>` or `serde_json::Value`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        if self.body.trim().is_empty() {
            serde_json::from_str("null")
        } else {
            serde_json::from_str(&self.body)
        }
    }
}

/// Production transport using reqwest
///
/// The cookie store is enabled so session cookies set by the backend are sent
/// back on every later request, including the refresh and logout calls.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    inner: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport whose requests abort after `timeout`
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder().cookie_store(true);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let inner = builder.build().context("Failed to create HTTP client")?;

        Ok(Self { inner })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let mut builder = self
            .inner
            .request(request.method.clone(), &request.url)
            .headers(request.headers.clone());

        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.context("Failed to send request")?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        Ok(HttpResponse { status, body })
    }
}
