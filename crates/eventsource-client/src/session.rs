//! EventSource session
//!
//! One [`EventSource`] is one logical stream: it connects, feeds the body
//! through the SSE parser, hands events to the application and reconnects
//! after the retry interval whenever the stream ends or the network fails.
//! Only an HTTP-level rejection (non-2xx status or wrong content type) ends
//! the session on its own.
//!
//! # Lifecycle
//!
//! ```text
//!            open()                 2xx text/event-stream
//! Closed ───────────▶ Connecting ─────────────────────────▶ Open
//!   ▲                  │      ▲                               │
//!   │  status/content  │      │ retry interval elapsed        │ end of stream
//!   │  type rejected   │      │                               │ network error
//!   ├──────────────────┘      └──── Closed (reconnect ◀───────┘
//!   │                                 pending)
//!   └──── close() from any state
//! ```
//!
//! Every `open()` starts a new connection generation. The background task
//! checks its generation under the state lock before each step, and handler
//! invocations hold a delivery lock that `close()` also takes, so nothing is
//! delivered once `close()` has returned.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use parking_lot::{Mutex, ReentrantMutex};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use url::Url;

use eventsource_core::{Event, EventStreamParser, Output};

use crate::config::EventSourceConfig;
use crate::error::{EventSourceError, Result};
use crate::stream::EventStream;
use crate::transport::{EventSourceRequest, ReqwestTransport, Transport};

/// Media type of an event stream
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

const LAST_EVENT_ID: &str = "last-event-id";

/// Connection state of an [`EventSource`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadyState {
    /// Not connected (initial state, after `close()`, after a fatal error,
    /// and while waiting to reconnect)
    Closed,
    /// Request issued, response not accepted yet
    Connecting,
    /// Receiving events
    Open,
}

/// Callback invoked for every dispatched event
pub type EventHandler = Box<dyn Fn(Event) + Send + Sync>;

/// Callback invoked when the session ends with a fatal error
pub type CompletionHandler = Box<dyn Fn(EventSourceError) + Send + Sync>;

struct SessionState {
    ready_state: ReadyState,
    last_event_id: Option<String>,
    retry_interval: Duration,
    task: Option<JoinHandle<()>>,
    generation: u64,
    reconnect_pending: bool,
}

struct Shared {
    url: Url,
    headers: HeaderMap,
    transport: Arc<dyn Transport>,
    runtime: Handle,
    handler: EventHandler,
    completion: CompletionHandler,
    /// Held while a handler runs; re-entrant so handlers may call `close()`
    delivery: ReentrantMutex<()>,
    state: Mutex<SessionState>,
    /// Only touched by the connection task
    parser: Mutex<EventStreamParser>,
}

/// A reconnecting Server-Sent Events client
///
/// # Example
///
/// ```no_run
/// use eventsource_client::EventSource;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let source = EventSource::new(
///     "http://localhost:8080/events",
///     |event| println!("{}: {}", event.event_type(), event.data),
///     |error| eprintln!("stream failed: {}", error),
/// )?;
///
/// source.open()?;
/// // ...
/// source.close()?;
/// # Ok(())
/// # }
/// ```
pub struct EventSource {
    shared: Arc<Shared>,
}

impl EventSource {
    /// Create an event source for `url` using the default HTTP transport
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<H, C>(url: &str, handler: H, completion: C) -> Result<Self>
    where
        H: Fn(Event) + Send + Sync + 'static,
        C: Fn(EventSourceError) + Send + Sync + 'static,
    {
        Self::with_config(EventSourceConfig::new(url), handler, completion)
    }

    /// Create an event source that sends extra headers with every request
    pub fn with_headers<I, K, V, H, C>(
        url: &str,
        headers: I,
        handler: H,
        completion: C,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
        H: Fn(Event) + Send + Sync + 'static,
        C: Fn(EventSourceError) + Send + Sync + 'static,
    {
        let config = headers
            .into_iter()
            .fold(EventSourceConfig::builder(url), |builder, (name, value)| {
                builder.header(name, value)
            })
            .build();
        Self::with_config(config, handler, completion)
    }

    /// Create an event source from a configuration
    pub fn with_config<H, C>(config: EventSourceConfig, handler: H, completion: C) -> Result<Self>
    where
        H: Fn(Event) + Send + Sync + 'static,
        C: Fn(EventSourceError) + Send + Sync + 'static,
    {
        let transport = ReqwestTransport::with_connect_timeout(config.connect_timeout())
            .map_err(|e| EventSourceError::Configuration(e.to_string()))?;
        Self::with_transport(config, Arc::new(transport), handler, completion)
    }

    /// Create an event source on a custom transport
    pub fn with_transport<H, C>(
        config: EventSourceConfig,
        transport: Arc<dyn Transport>,
        handler: H,
        completion: C,
    ) -> Result<Self>
    where
        H: Fn(Event) + Send + Sync + 'static,
        C: Fn(EventSourceError) + Send + Sync + 'static,
    {
        config.validate()?;
        let url = config.parsed_url()?;
        let headers = config.header_map()?;
        let runtime = Handle::try_current().map_err(|e| {
            EventSourceError::Configuration(format!("EventSource requires a tokio runtime: {}", e))
        })?;

        let shared = Shared {
            url,
            headers,
            transport,
            runtime,
            handler: Box::new(handler),
            completion: Box::new(completion),
            delivery: ReentrantMutex::new(()),
            state: Mutex::new(SessionState {
                ready_state: ReadyState::Closed,
                last_event_id: None,
                retry_interval: config.retry_interval(),
                task: None,
                generation: 0,
                reconnect_pending: false,
            }),
            parser: Mutex::new(EventStreamParser::with_max_event_size(config.max_event_size)),
        };

        Ok(Self {
            shared: Arc::new(shared),
        })
    }

    /// Create an event source whose events and fatal errors are delivered
    /// through an [`EventStream`] instead of callbacks
    pub fn subscribe(config: EventSourceConfig) -> Result<(Self, EventStream)> {
        let transport = ReqwestTransport::with_connect_timeout(config.connect_timeout())
            .map_err(|e| EventSourceError::Configuration(e.to_string()))?;
        Self::subscribe_with_transport(config, Arc::new(transport))
    }

    /// Like [`subscribe`](Self::subscribe), on a custom transport
    pub fn subscribe_with_transport(
        config: EventSourceConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<(Self, EventStream)> {
        let (event_tx, rx) = mpsc::unbounded_channel();
        let error_tx = event_tx.clone();

        let source = Self::with_transport(
            config,
            transport,
            move |event| {
                let _ = event_tx.send(Ok(event));
            },
            move |error| {
                let _ = error_tx.send(Err(error));
            },
        )?;

        Ok((source, EventStream::new(rx)))
    }

    /// Start connecting
    ///
    /// Fails with `InvalidOperation` unless the source is closed. Called
    /// while a reconnect is pending, it cancels the wait and connects now.
    pub fn open(&self) -> Result<()> {
        // Waits out a completion handler that is still running for the
        // previous connection
        let _delivery = self.shared.delivery.lock();
        let mut state = self.shared.state.lock();
        if state.ready_state != ReadyState::Closed {
            return Err(EventSourceError::invalid_operation(format!(
                "cannot open an event source that is {:?}",
                state.ready_state
            )));
        }

        if let Some(task) = state.task.take() {
            task.abort();
        }
        state.generation += 1;
        state.ready_state = ReadyState::Connecting;
        state.reconnect_pending = false;

        info!(url = %self.shared.url, "Opening event stream");
        let shared = Arc::clone(&self.shared);
        let generation = state.generation;
        state.task = Some(self.shared.runtime.spawn(run(shared, generation)));
        Ok(())
    }

    /// Stop the stream and any pending reconnect
    ///
    /// Fails with `InvalidOperation` if the source is already closed. The
    /// completion handler is not invoked. Once this returns, no handler is
    /// called until the next `open()`.
    pub fn close(&self) -> Result<()> {
        let _delivery = self.shared.delivery.lock();
        let mut state = self.shared.state.lock();
        if state.ready_state == ReadyState::Closed && !state.reconnect_pending {
            return Err(EventSourceError::invalid_operation(
                "event source is already closed",
            ));
        }

        state.generation += 1;
        state.ready_state = ReadyState::Closed;
        state.reconnect_pending = false;
        if let Some(task) = state.task.take() {
            task.abort();
        }

        info!(url = %self.shared.url, "Closed event stream");
        Ok(())
    }

    pub fn ready_state(&self) -> ReadyState {
        self.shared.state.lock().ready_state
    }

    /// ID of the most recent event that carried one
    pub fn last_event_id(&self) -> Option<String> {
        self.shared.state.lock().last_event_id.clone()
    }

    /// Delay before the next reconnect
    pub fn retry_interval(&self) -> Duration {
        self.shared.state.lock().retry_interval
    }

    pub fn url(&self) -> &Url {
        &self.shared.url
    }
}

impl fmt::Debug for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("EventSource")
            .field("url", &self.shared.url.as_str())
            .field("ready_state", &state.ready_state)
            .field("last_event_id", &state.last_event_id)
            .field("retry_interval", &state.retry_interval)
            .finish()
    }
}

impl Drop for EventSource {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        state.generation += 1;
        state.ready_state = ReadyState::Closed;
        state.reconnect_pending = false;
        if let Some(task) = state.task.take() {
            task.abort();
        }
    }
}

/// How one connection attempt ended
enum Attempt {
    /// Stream ended or the network failed; reconnect
    Disconnected,
    /// The server rejected the stream
    Fatal(EventSourceError),
    /// The session moved on to another generation
    Cancelled,
}

/// Connection task: connect, stream, wait, reconnect
async fn run(shared: Arc<Shared>, generation: u64) {
    loop {
        let Some(request) = shared.request(generation) else {
            return;
        };

        match shared.connect(generation, &request).await {
            Attempt::Disconnected => {}
            Attempt::Fatal(error) => {
                shared.fail(generation, error);
                return;
            }
            Attempt::Cancelled => return,
        }

        let Some(delay) = shared.schedule_reconnect(generation) else {
            return;
        };
        tokio::time::sleep(delay).await;

        if !shared.resume(generation) {
            return;
        }
    }
}

impl Shared {
    /// Build the request for the next attempt
    fn request(&self, generation: u64) -> Option<EventSourceRequest> {
        let state = self.state.lock();
        if state.generation != generation {
            return None;
        }

        let mut headers = self.headers.clone();
        headers.insert(ACCEPT, HeaderValue::from_static(EVENT_STREAM_CONTENT_TYPE));
        if let Some(id) = state.last_event_id.as_deref().filter(|id| !id.is_empty()) {
            match HeaderValue::from_str(id) {
                Ok(value) => {
                    headers.insert(HeaderName::from_static(LAST_EVENT_ID), value);
                }
                Err(_) => warn!("Last event ID {:?} is not a valid header value, omitting it", id),
            }
        }

        Some(EventSourceRequest {
            url: self.url.clone(),
            headers,
        })
    }

    async fn connect(&self, generation: u64, request: &EventSourceRequest) -> Attempt {
        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %self.url, "Event stream connection failed: {}", e);
                return Attempt::Disconnected;
            }
        };

        if !(200..300).contains(&response.status) {
            return Attempt::Fatal(EventSourceError::from_status(response.status));
        }
        if !is_event_stream(response.content_type()) {
            return Attempt::Fatal(EventSourceError::IncorrectResponseContentType {
                content_type: response.content_type().map(str::to_string),
            });
        }
        if !self.mark_open(generation) {
            return Attempt::Cancelled;
        }

        let mut body = response.body;
        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => {
                    if !self.process_chunk(generation, &bytes) {
                        return Attempt::Cancelled;
                    }
                }
                Err(e) => {
                    warn!(url = %self.url, "Event stream interrupted: {}", e);
                    return Attempt::Disconnected;
                }
            }
        }

        debug!(url = %self.url, "Event stream ended");
        Attempt::Disconnected
    }

    fn mark_open(&self, generation: u64) -> bool {
        let mut state = self.state.lock();
        if state.generation != generation {
            return false;
        }
        state.ready_state = ReadyState::Open;
        self.parser.lock().reset();

        info!(url = %self.url, "Event stream open");
        true
    }

    /// Parse one chunk and hand out what it completes; false once the
    /// session has moved to another generation
    fn process_chunk(&self, generation: u64, chunk: &[u8]) -> bool {
        let outputs = self.parser.lock().feed(chunk);

        for output in outputs {
            let current = match output {
                Output::Event(event) => self.deliver(generation, event),
                Output::Retry(retry) => self.update_retry(generation, retry.as_duration()),
            };
            if !current {
                return false;
            }
        }
        true
    }

    fn deliver(&self, generation: u64, event: Event) -> bool {
        let _delivery = self.delivery.lock();
        {
            let mut state = self.state.lock();
            if state.generation != generation {
                return false;
            }
            if let Some(id) = &event.id {
                state.last_event_id = Some(id.clone());
            }
        }

        trace!(event_type = event.event_type(), "Dispatching SSE event");
        (self.handler)(event);
        true
    }

    fn update_retry(&self, generation: u64, interval: Duration) -> bool {
        let mut state = self.state.lock();
        if state.generation != generation {
            return false;
        }
        debug!(retry_ms = interval.as_millis() as u64, "Server set retry interval");
        state.retry_interval = interval;
        true
    }

    fn schedule_reconnect(&self, generation: u64) -> Option<Duration> {
        let mut state = self.state.lock();
        if state.generation != generation {
            return None;
        }
        state.ready_state = ReadyState::Closed;
        state.reconnect_pending = true;

        let delay = state.retry_interval;
        info!(
            url = %self.url,
            delay_ms = delay.as_millis() as u64,
            "Event stream disconnected, reconnect scheduled"
        );
        Some(delay)
    }

    fn resume(&self, generation: u64) -> bool {
        let mut state = self.state.lock();
        if state.generation != generation {
            return false;
        }
        state.ready_state = ReadyState::Connecting;
        state.reconnect_pending = false;
        true
    }

    fn fail(&self, generation: u64, error: EventSourceError) {
        let _delivery = self.delivery.lock();
        {
            let mut state = self.state.lock();
            if state.generation != generation {
                return;
            }
            state.ready_state = ReadyState::Closed;
            state.reconnect_pending = false;
            state.task = None;
        }

        warn!(url = %self.url, "Event stream failed: {}", error);
        (self.completion)(error);
    }
}

/// Whether a `Content-Type` names an event stream, ignoring parameters
fn is_event_stream(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|value| value.split(';').next())
        .is_some_and(|media_type| media_type.trim().eq_ignore_ascii_case(EVENT_STREAM_CONTENT_TYPE))
}
