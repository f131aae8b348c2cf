//! Error types for EventSource sessions

use thiserror::Error;

/// Result type alias for EventSource operations
pub type Result<T> = std::result::Result<T, EventSourceError>;

/// Errors reported by an [`EventSource`](crate::EventSource)
///
/// `InvalidOperation` and the construction errors are returned synchronously.
/// The HTTP-level variants end a session and reach the application through
/// the completion handler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventSourceError {
    /// `open()` while not closed, or `close()` while already closed
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// The server answered 404 or 410
    #[error("Resource not found (HTTP {status})")]
    ResourceNotFound { status: u16 },

    /// The server rejected the request with another non-2xx status
    #[error("Server rejected stream request with HTTP {status}")]
    HttpStatus { status: u16 },

    /// The response was not `text/event-stream`
    #[error("Incorrect response content type: {}", content_type.as_deref().unwrap_or("<none>"))]
    IncorrectResponseContentType { content_type: Option<String> },

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Invalid configuration (headers, limits, missing runtime)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Anything not covered by a more specific kind
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl EventSourceError {
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }

    /// Map a rejected HTTP status to its error kind
    pub fn from_status(status: u16) -> Self {
        match status {
            404 | 410 => Self::ResourceNotFound { status },
            _ => Self::HttpStatus { status },
        }
    }

    /// HTTP status carried by the error, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::ResourceNotFound { status } | Self::HttpStatus { status } => Some(*status),
            _ => None,
        }
    }

    /// Whether this error ends a session instead of triggering a reconnect
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ResourceNotFound { .. }
                | Self::HttpStatus { .. }
                | Self::IncorrectResponseContentType { .. }
        )
    }
}

/// Errors raised by a [`Transport`](crate::transport::Transport)
///
/// A session treats every transport error as a recoverable disconnect.
#[derive(Error, Debug)]
pub enum TransportError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Connection could not be established
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The body stream failed mid-way
    #[error("Stream error: {0}")]
    Stream(String),

    /// The transport has shut down
    #[error("Transport closed")]
    Closed,
}
