//! Decoded stream items

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Event type assumed when the stream did not name one
pub const DEFAULT_EVENT_TYPE: &str = "message";

/// A complete event, dispatched at a blank line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Value of the last `event:` field, if any
    #[serde(rename = "event", default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,

    /// All `data:` values of the event joined with `\n`
    pub data: String,

    /// Value of the last `id:` field, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Event {
    /// Create an event
    pub fn new(event_type: Option<String>, data: impl Into<String>, id: Option<String>) -> Self {
        Self {
            event_type,
            data: data.into(),
            id,
        }
    }

    /// Event type as consumers see it (`"message"` when absent or empty)
    pub fn event_type(&self) -> &str {
        match self.event_type.as_deref() {
            Some(kind) if !kind.is_empty() => kind,
            _ => DEFAULT_EVENT_TYPE,
        }
    }

    /// Decode the data payload as JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.data)
    }
}

/// Reconnection delay requested by the server through a `retry:` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RetryUpdate {
    millis: u64,
}

impl RetryUpdate {
    pub fn from_millis(millis: u64) -> Self {
        Self { millis }
    }

    pub fn millis(&self) -> u64 {
        self.millis
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_millis(self.millis)
    }
}

/// Something the accumulator produced from a line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// A dispatched event
    Event(Event),
    /// A new reconnection delay
    Retry(RetryUpdate),
}
