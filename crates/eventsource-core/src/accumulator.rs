//! SSE field grammar
//!
//! Turns decoded lines into events and retry updates. An event that grows
//! past the size limit is discarded, and everything up to the next blank line
//! is skipped so the stream stays in sync.

use tracing::trace;

use crate::error::{ParseError, ParseResult};
use crate::event::{Event, Output, RetryUpdate};

/// Default upper bound for the buffered size of one event (1 MiB)
pub const DEFAULT_MAX_EVENT_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum AccumulatorState {
    #[default]
    Normal,
    IgnoringUntilBlankLine,
}

/// Accumulates fields of the in-progress event
#[derive(Debug)]
pub struct FieldAccumulator {
    state: AccumulatorState,
    event_type: Option<String>,
    data: String,
    id: Option<String>,
    max_event_size: usize,
}

impl Default for FieldAccumulator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EVENT_SIZE)
    }
}

impl FieldAccumulator {
    pub fn new(max_event_size: usize) -> Self {
        Self {
            state: AccumulatorState::Normal,
            event_type: None,
            data: String::new(),
            id: None,
            max_event_size,
        }
    }

    pub fn max_event_size(&self) -> usize {
        self.max_event_size
    }

    /// Process one line
    ///
    /// Returns the event completed by a blank line, a retry update, or
    /// nothing. Errors only concern this line; the accumulator stays usable.
    pub fn update(&mut self, line: &[u8]) -> ParseResult<Option<Output>> {
        if line.is_empty() {
            return Ok(self.dispatch());
        }

        if self.state == AccumulatorState::IgnoringUntilBlankLine {
            return Ok(None);
        }

        if line[0] == b':' {
            trace!("SSE comment");
            return Ok(None);
        }

        let line = std::str::from_utf8(line)
            .map_err(|e| ParseError::InvalidParameter(format!("Invalid UTF-8 in SSE line: {}", e)))?;

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => {
                self.event_type = Some(value.to_string());
            }
            "data" => {
                let size = self.buffered_size() + value.len() + 1;
                if size > self.max_event_size {
                    self.clear_buffers();
                    self.state = AccumulatorState::IgnoringUntilBlankLine;
                    return Err(ParseError::EventTooLarge {
                        limit: self.max_event_size,
                    });
                }
                self.data.push_str(value);
                self.data.push('\n');
            }
            "id" => {
                if value.contains('\0') {
                    trace!("SSE id containing NUL ignored");
                } else {
                    self.id = Some(value.to_string());
                }
            }
            "retry" => {
                if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
                    trace!("SSE retry ignored: {:?}", value);
                    return Ok(None);
                }
                match value.parse::<u64>() {
                    Ok(millis) => return Ok(Some(Output::Retry(RetryUpdate::from_millis(millis)))),
                    Err(_) => trace!("SSE retry out of range: {}", value),
                }
            }
            _ => {
                trace!("SSE unknown field: {}", field);
            }
        }

        Ok(None)
    }

    /// Discard the in-progress event and skip lines up to the next blank
    /// line, as for an oversized `data` field
    pub fn skip_event(&mut self) {
        self.clear_buffers();
        self.state = AccumulatorState::IgnoringUntilBlankLine;
    }

    /// Drop the in-progress event and leave recovery mode
    pub fn reset(&mut self) {
        self.clear_buffers();
        self.state = AccumulatorState::Normal;
    }

    fn dispatch(&mut self) -> Option<Output> {
        let ignoring = self.state == AccumulatorState::IgnoringUntilBlankLine;
        self.state = AccumulatorState::Normal;

        if ignoring || self.data.is_empty() {
            self.clear_buffers();
            return None;
        }

        // Drop the trailing newline of the last data line; the buffer keeps
        // its capacity for the next event
        let data = self.data[..self.data.len() - 1].to_string();
        self.data.clear();
        let event = Event {
            event_type: self.event_type.take(),
            data,
            id: self.id.take(),
        };
        Some(Output::Event(event))
    }

    fn buffered_size(&self) -> usize {
        self.event_type.as_ref().map_or(0, String::len)
            + self.data.len()
            + self.id.as_ref().map_or(0, String::len)
    }

    fn clear_buffers(&mut self) {
        self.event_type = None;
        self.data.clear();
        self.id = None;
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> AccumulatorState {
        self.state
    }

    #[cfg(test)]
    pub(crate) fn buffered(&self) -> (Option<&str>, &str, Option<&str>) {
        (self.event_type.as_deref(), &self.data, self.id.as_deref())
    }
}
