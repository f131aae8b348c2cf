//! eventsource-core - Decoding of the `text/event-stream` wire format
//!
//! This crate turns an arbitrarily chunked byte stream into Server-Sent
//! Events. It does no I/O; the `eventsource-client` crate drives it from an
//! HTTP response body.
//!
//! The pipeline has two stages:
//! - [`LineSplitter`] splits bytes on LF, CR and CRLF, even when a CRLF pair
//!   straddles two chunks.
//! - [`FieldAccumulator`] applies the field grammar (`event`, `data`, `id`,
//!   `retry`, comments) and assembles events at blank lines.
//!
//! [`EventStreamParser`] wires both together.
//!
//! # Example
//!
//! ```
//! use eventsource_core::{EventStreamParser, Output};
//!
//! let mut parser = EventStreamParser::new();
//! assert!(parser.feed(b"data: hel").is_empty());
//!
//! let outputs = parser.feed(b"lo\r\n\r\n");
//! match &outputs[..] {
//!     [Output::Event(event)] => assert_eq!(event.data, "hello"),
//!     other => panic!("unexpected outputs: {:?}", other),
//! }
//! ```

pub mod accumulator;
pub mod error;
pub mod event;
pub mod line;
pub mod parser;

pub use accumulator::{FieldAccumulator, DEFAULT_MAX_EVENT_SIZE};
pub use error::{ParseError, ParseResult};
pub use event::{Event, Output, RetryUpdate, DEFAULT_EVENT_TYPE};
pub use line::{Line, LineSplitter};
pub use parser::EventStreamParser;
