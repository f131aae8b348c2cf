//! Errors raised while decoding an event stream
//!
//! Both kinds are local to a single line or event. The parser recovers from
//! them by dropping the offending unit; they never terminate a stream.

use thiserror::Error;

/// Result type for field accumulation
pub type ParseResult<T> = Result<T, ParseError>;

/// Errors that can occur while accumulating SSE fields
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The line could not be interpreted (e.g. it is not valid UTF-8)
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The in-progress event grew past the configured limit
    #[error("Event too large: exceeds {limit} bytes")]
    EventTooLarge {
        /// Maximum cumulative size of one event, in bytes
        limit: usize,
    },
}
