use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::Serialize;

use super::error::ApiError;
use super::http::HttpRequest;
use super::query::to_query_string;

/// Describes one logical API call
///
/// The body and query are serialized when the descriptor is built, so an
/// `ApiRequest` never changes after construction and can be replayed as-is.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    endpoint: String,
    body: Option<String>,
    query: String,
    headers: HeaderMap,
}

impl ApiRequest {
    /// Creates a request without body or query
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            body: None,
            query: String::new(),
            headers: HeaderMap::new(),
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(Method::POST, endpoint)
    }

    pub fn put(endpoint: impl Into<String>) -> Self {
        Self::new(Method::PUT, endpoint)
    }

    pub fn patch(endpoint: impl Into<String>) -> Self {
        Self::new(Method::PATCH, endpoint)
    }

    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(Method::DELETE, endpoint)
    }

    /// Sets the JSON body
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        let body = serde_json::to_string(body)
            .map_err(|e| ApiError::encode(format!("Failed to serialize request body: {e}")))?;
        self.body = Some(body);
        Ok(self)
    }

    /// Sets the query parameters (see [`to_query_string`])
    pub fn query<Q: Serialize + ?Sized>(mut self, params: &Q) -> Result<Self, ApiError> {
        self.query = to_query_string(params)?;
        Ok(self)
    }

    /// Adds or overrides a header for this call only
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Builds the transport request against `base_url`
    ///
    /// `Content-Type: application/json` is always set first so a per-call
    /// header can replace it.
    pub(crate) fn to_http(&self, base_url: &str) -> HttpRequest {
        let mut url = format!("{}{}", base_url, self.endpoint);
        if !self.query.is_empty() {
            url.push(if self.endpoint.contains('?') { '&' } else { '?' });
            url.push_str(&self.query);
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in &self.headers {
            headers.insert(name.clone(), value.clone());
        }

        HttpRequest {
            method: self.method.clone(),
            url,
            headers,
            body: self.body.clone(),
        }
    }
}
