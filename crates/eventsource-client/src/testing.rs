//! Test utilities for eventsource-client
//!
//! - [`MockTransport`] replays scripted responses without any networking and
//!   records every request it receives.
//! - [`TestServer`] runs an axum router on an ephemeral port for tests that
//!   go through the real HTTP transport.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use tokio::net::TcpListener;

use crate::error::TransportError;
use crate::session::EVENT_STREAM_CONTENT_TYPE;
use crate::transport::{EventSourceRequest, Transport, TransportResponse};

/// How a scripted response body ends after its chunks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEnding {
    /// Clean end of stream
    Close,
    /// Body fails with a stream error
    Fail(String),
    /// Body never ends
    Hang,
}

/// A scripted response for [`MockTransport`]
#[derive(Debug, Clone)]
pub struct MockResponse {
    status: u16,
    headers: HeaderMap,
    chunks: Vec<Bytes>,
    ending: MockEnding,
}

impl MockResponse {
    /// `200 OK` event stream delivering `chunks` one by one, then closing
    pub fn event_stream<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static(EVENT_STREAM_CONTENT_TYPE),
        );
        Self {
            status: 200,
            headers,
            chunks: chunks.into_iter().map(Into::into).collect(),
            ending: MockEnding::Close,
        }
    }

    /// Response with the given status and no body
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            chunks: Vec::new(),
            ending: MockEnding::Close,
        }
    }

    /// Replace the `Content-Type` header
    pub fn with_content_type(mut self, content_type: &'static str) -> Self {
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        self
    }

    /// Keep the body open after the last chunk
    pub fn hang(mut self) -> Self {
        self.ending = MockEnding::Hang;
        self
    }

    /// Fail the body after the last chunk
    pub fn fail(mut self, reason: impl Into<String>) -> Self {
        self.ending = MockEnding::Fail(reason.into());
        self
    }

    fn into_transport_response(self) -> TransportResponse {
        let chunks = stream::iter(self.chunks.into_iter().map(Ok::<Bytes, TransportError>));
        let body = match self.ending {
            MockEnding::Close => chunks.boxed(),
            MockEnding::Fail(reason) => chunks
                .chain(stream::once(futures::future::ready(Err(
                    TransportError::Stream(reason),
                ))))
                .boxed(),
            MockEnding::Hang => chunks.chain(stream::pending()).boxed(),
        };

        TransportResponse {
            status: self.status,
            headers: self.headers,
            body,
        }
    }
}

enum Scripted {
    Response(MockResponse),
    ConnectError(String),
}

/// Transport that answers requests from a queue of scripted responses
///
/// When the queue is empty a request stays pending forever, which keeps the
/// session in `Connecting` without spinning through reconnects.
#[derive(Default)]
pub struct MockTransport {
    queue: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<EventSourceRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the next request
    pub fn enqueue_response(&self, response: MockResponse) {
        self.queue.lock().push_back(Scripted::Response(response));
    }

    /// Queue a connection failure for the next request
    pub fn enqueue_error(&self, reason: impl Into<String>) {
        self.queue
            .lock()
            .push_back(Scripted::ConnectError(reason.into()));
    }

    /// Drop every queued response
    pub fn drain_response_queue(&self) {
        self.queue.lock().clear();
    }

    /// Requests received so far, oldest first
    pub fn requests(&self) -> Vec<EventSourceRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &EventSourceRequest) -> Result<TransportResponse, TransportError> {
        self.requests.lock().push(request.clone());

        let next = self.queue.lock().pop_front();
        match next {
            Some(Scripted::Response(response)) => {
                tracing::debug!(status = response.status, "Mock transport: scripted response");
                Ok(response.into_transport_response())
            }
            Some(Scripted::ConnectError(reason)) => Err(TransportError::Connection(reason)),
            None => std::future::pending().await,
        }
    }
}

/// A test server that automatically shuts down when dropped
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    /// Serve an axum Router on an ephemeral local port
    ///
    /// # Example
    ///
    /// ```ignore
    /// use eventsource_client::testing::TestServer;
    ///
    /// let router = axum::Router::new().route("/events", axum::routing::get(events));
    /// let server = TestServer::start(router).await?;
    /// let source = EventSource::new(&server.url("/events"), on_event, on_error)?;
    /// ```
    pub async fn start<S>(router: axum::Router<S>) -> std::io::Result<Self>
    where
        S: Clone + Send + Sync + 'static,
        axum::Router<S>: Into<axum::Router>,
    {
        // Bind to any available port
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let router: axum::Router = router.into();

        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        // Give server a moment to start
        tokio::time::sleep(Duration::from_millis(10)).await;

        Ok(Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Get the base URL of the test server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Absolute URL for a path on the test server
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    /// Shutdown the server gracefully
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Wait for a condition with timeout
pub async fn wait_for<F, Fut>(condition: F, timeout: Duration) -> bool
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;

    while tokio::time::Instant::now() < deadline {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    false
}
