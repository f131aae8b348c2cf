//! Transport layer for event streams
//!
//! A [`Transport`] issues one HTTP request and hands back the response
//! metadata together with the body as a stream of byte chunks. The end of the
//! body stream is a clean termination; an `Err` item is a failed one.
//!
//! [`ReqwestTransport`] is the default implementation. Tests use
//! [`MockTransport`](crate::testing::MockTransport).

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::error::TransportError;

/// Request issued for one connection attempt
#[derive(Debug, Clone)]
pub struct EventSourceRequest {
    pub url: Url,
    pub headers: HeaderMap,
}

/// Response to an [`EventSourceRequest`]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body chunks
    pub body: BoxStream<'static, Result<Bytes, TransportError>>,
}

impl TransportResponse {
    /// Raw `Content-Type` header, if present and readable
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Transport-agnostic interface for opening event streams
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request and return once response metadata is available
    async fn send(&self, request: &EventSourceRequest) -> Result<TransportResponse, TransportError>;
}

/// Default connection timeout
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// [`Transport`] backed by a `reqwest` client
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        Self::with_connect_timeout(DEFAULT_CONNECT_TIMEOUT)
    }

    /// Create a transport with a custom connect timeout
    ///
    /// No overall request timeout is set: an event stream body is unbounded.
    pub fn with_connect_timeout(connect_timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder().connect_timeout(connect_timeout).build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client, reusing its connection pool and defaults
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    pub fn http_client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &EventSourceRequest) -> Result<TransportResponse, TransportError> {
        debug!("Connecting to SSE stream: {}", request.url);

        let response = self
            .client
            .get(request.url.clone())
            .headers(request.headers.clone())
            .send()
            .await?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(TransportError::from))
            .boxed();

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}
