//! EventSource Client Library
//!
//! A Server-Sent Events client that keeps a stream alive across disconnects.
//! Each [`EventSource`] connects to one URL, decodes the `text/event-stream`
//! body with [`eventsource_core`], calls an event handler for every event and
//! reconnects after the server-controlled retry interval, sending the last
//! seen event ID so the server can resume.
//!
//! # Example
//!
//! ```rust,no_run
//! use eventsource_client::{EventSource, ReadyState};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = EventSource::with_headers(
//!         "http://localhost:8080/events",
//!         [("Authorization", "Bearer secret")],
//!         |event| println!("[{}] {}", event.event_type(), event.data),
//!         |error| eprintln!("stream rejected: {}", error),
//!     )?;
//!
//!     source.open()?;
//!     tokio::time::sleep(std::time::Duration::from_secs(30)).await;
//!
//!     if source.ready_state() != ReadyState::Closed {
//!         source.close()?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Testing
//!
//! The `testing` module provides a scripted transport and a local HTTP
//! server:
//!
//! ```rust,ignore
//! use eventsource_client::testing::{MockResponse, MockTransport};
//!
//! let transport = Arc::new(MockTransport::new());
//! transport.enqueue_response(MockResponse::event_stream(["data: hello\n\n"]));
//! let source = EventSource::with_transport(config, transport.clone(), on_event, on_error)?;
//! ```

mod config;
mod error;
mod session;
mod stream;
pub mod testing;
pub mod transport;

pub use config::{
    ConfigError, EventSourceConfig, EventSourceConfigBuilder, TimeoutsConfig,
    DEFAULT_RETRY_INTERVAL,
};
pub use error::{EventSourceError, Result, TransportError};
pub use session::{
    CompletionHandler, EventHandler, EventSource, ReadyState, EVENT_STREAM_CONTENT_TYPE,
};
pub use stream::EventStream;
pub use transport::{EventSourceRequest, ReqwestTransport, Transport, TransportResponse};

// Re-export wire types for convenience
pub use eventsource_core::{Event, RetryUpdate};
