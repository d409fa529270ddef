//! # HTTP Retrieval Utilities
//!
//! An asynchronous API client wrapper around `reqwest`. Non-2xx statuses are
//! not errors here: the response is returned as-is so the caller can classify
//! it. Only transport-level failures (connection refused, DNS, timeout, body
//! read) surface as `TransportError`.

use reqwest::{header::HeaderMap, header::CONTENT_TYPE, Method, Url};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Network failure: {0}")]
    Network(String),

    #[error("Invalid request URL: {0}")]
    Url(#[from] url::ParseError),
}

/// A raw HTTP response, body fully read as text.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// The numeric HTTP status code.
    pub status: u16,
    /// Indicates if the status code was in the 2xx range.
    pub success: bool,
    /// The response body decoded as UTF-8 text.
    pub body: String,
    /// The declared `content-type`, if any.
    pub content_type: Option<String>,
    /// The headers returned by the server.
    pub headers: HeaderMap,
}

impl ApiResponse {
    /// Builds a response without going over the network. Mostly useful in tests.
    pub fn from_parts(status: u16, body: impl Into<String>, content_type: Option<&str>) -> Self {
        Self {
            status,
            success: (200..300).contains(&status),
            body: body.into(),
            content_type: content_type.map(str::to_string),
            headers: HeaderMap::new(),
        }
    }
}

/// A flexible asynchronous HTTP client.
///
/// Built on top of `reqwest_middleware`. By default every request is a single
/// attempt; `transient_retries > 0` installs the exponential-backoff retry
/// middleware for connection-level failures.
pub struct ApiClient {
    /// The underlying middleware-enabled client.
    inner: ClientWithMiddleware,
    /// The base URL to which all relative paths are joined.
    base_url: Url,
}

impl ApiClient {
    /// Creates a new `ApiClient`.
    ///
    /// # Arguments
    /// * `base_url` - Absolute base URL; relative paths are joined onto it.
    /// * `transient_retries` - Retries for transient failures (0 disables the middleware).
    pub fn new(base_url: Url, transient_retries: u32) -> Self {
        let mut builder = ClientBuilder::new(reqwest::Client::new());
        if transient_retries > 0 {
            let retry_policy = ExponentialBackoff::builder().build_with_max_retries(transient_retries);
            builder = builder.with(RetryTransientMiddleware::new_with_policy(retry_policy));
        }

        Self {
            inner: builder.build(),
            base_url,
        }
    }

    /// The base URL this client was created with.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Joins a relative path onto the base URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        Ok(self.base_url.join(path)?)
    }

    /// Performs an HTTP request and reads the whole body as text.
    ///
    /// # Errors
    /// Returns `TransportError::Network` if the request cannot be sent or the
    /// body cannot be read. HTTP error statuses are returned as `Ok`.
    pub async fn request(
        &self,
        method: Method,
        url: Url,
        headers: Option<HeaderMap>,
    ) -> Result<ApiResponse, TransportError> {
        let mut req = self.inner.request(method, url);
        if let Some(h) = headers {
            req = req.headers(h);
        }

        let response: reqwest::Response = req
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        let resp_headers = response.headers().clone();
        let content_type = resp_headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(ApiResponse {
            status: status.as_u16(),
            success: status.is_success(),
            body,
            content_type,
            headers: resp_headers,
        })
    }
}
