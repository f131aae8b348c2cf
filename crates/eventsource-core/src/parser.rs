//! SSE stream parser
//!
//! Combines the line splitter and the field accumulator into a single
//! chunk-in, events-out decoder. Line-level errors are logged and dropped.
//!
//! The splitter's unterminated tail is capped a little above the event size
//! limit. A line that outgrows it across chunks is treated like an oversized
//! `data` field: the event is discarded and parsing resumes after the next
//! blank line on the same stream.

use tracing::{debug, warn};

use crate::accumulator::{FieldAccumulator, DEFAULT_MAX_EVENT_SIZE};
use crate::error::ParseError;
use crate::event::Output;
use crate::line::LineSplitter;

/// Longest field prefix (`event: `) a line carries on top of its value
const FIELD_PREFIX_LEN: usize = "event: ".len();

/// Parser state for one event stream
#[derive(Debug)]
pub struct EventStreamParser {
    splitter: LineSplitter,
    accumulator: FieldAccumulator,
}

impl Default for EventStreamParser {
    fn default() -> Self {
        Self::new()
    }
}

impl EventStreamParser {
    pub fn new() -> Self {
        Self::with_max_event_size(DEFAULT_MAX_EVENT_SIZE)
    }

    pub fn with_max_event_size(max_event_size: usize) -> Self {
        Self {
            splitter: LineSplitter::with_max_line_len(
                max_event_size.saturating_add(FIELD_PREFIX_LEN),
            ),
            accumulator: FieldAccumulator::new(max_event_size),
        }
    }

    /// Feed bytes into the parser and extract everything they complete
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Output> {
        let mut outputs = Vec::new();

        for line in self.splitter.feed(chunk) {
            if line.is_oversized() {
                warn!(
                    limit = self.accumulator.max_event_size(),
                    "SSE line exceeds size limit, skipping to next blank line"
                );
                self.accumulator.skip_event();
                continue;
            }

            match self.accumulator.update(&line) {
                Ok(Some(output)) => outputs.push(output),
                Ok(None) => {}
                Err(ParseError::EventTooLarge { limit }) => {
                    warn!(limit, "SSE event exceeds size limit, skipping to next blank line");
                }
                Err(e) => {
                    debug!("Dropping SSE line: {}", e);
                }
            }
        }

        outputs
    }

    /// Discard partial lines and the in-progress event
    pub fn reset(&mut self) {
        self.splitter.reset();
        self.accumulator.reset();
    }

    /// Bytes buffered for a line that has not been terminated yet
    pub fn pending_len(&self) -> usize {
        self.splitter.pending_len()
    }

    pub fn max_event_size(&self) -> usize {
        self.accumulator.max_event_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Event, RetryUpdate};
    use pretty_assertions::assert_eq;

    fn events(outputs: Vec<Output>) -> Vec<Event> {
        outputs
            .into_iter()
            .filter_map(|o| match o {
                Output::Event(e) => Some(e),
                Output::Retry(_) => None,
            })
            .collect()
    }

    fn feed_in_chunks(parser: &mut EventStreamParser, input: &[u8], size: usize) -> Vec<Output> {
        input.chunks(size).flat_map(|c| parser.feed(c)).collect()
    }

    #[test]
    fn test_parse_simple_event() {
        let mut parser = EventStreamParser::new();
        let outputs = parser.feed(b"data: hello\n\n");
        assert_eq!(outputs, vec![Output::Event(Event::new(None, "hello", None))]);
    }

    #[test]
    fn test_parse_chunked_data() {
        let input = b"event: tick\r\ndata: {\"seq\":1}\r\nid: 1\r\n\r\ndata: a\rdata: b\r\r";
        let expected = vec![
            Event::new(Some("tick".into()), "{\"seq\":1}", Some("1".into())),
            Event::new(None, "a\nb", None),
        ];

        for size in 1..=input.len() {
            let mut parser = EventStreamParser::new();
            assert_eq!(
                events(feed_in_chunks(&mut parser, input, size)),
                expected,
                "chunk size {size}"
            );
        }
    }

    #[test]
    fn test_comment_before_event() {
        let mut parser = EventStreamParser::new();
        let outputs = parser.feed(b": this is a comment\ndata: x\n\n");
        assert_eq!(events(outputs), vec![Event::new(None, "x", None)]);
    }

    #[test]
    fn test_retry_without_event() {
        let mut parser = EventStreamParser::new();
        let outputs = parser.feed(b"retry: 5000\n\n");
        assert_eq!(outputs, vec![Output::Retry(RetryUpdate::from_millis(5000))]);
    }

    #[test]
    fn test_outputs_keep_stream_order() {
        let mut parser = EventStreamParser::new();
        let outputs = parser.feed(b"data: 1\n\nretry: 10\ndata: 2\n\n");
        assert_eq!(
            outputs,
            vec![
                Output::Event(Event::new(None, "1", None)),
                Output::Retry(RetryUpdate::from_millis(10)),
                Output::Event(Event::new(None, "2", None)),
            ]
        );
    }

    #[test]
    fn test_oversized_event_skipped() {
        let mut parser = EventStreamParser::with_max_event_size(8);
        let outputs = parser.feed(b"data: way too large\ndata: x\n\ndata: ok\n\n");
        assert_eq!(events(outputs), vec![Event::new(None, "ok", None)]);
    }

    #[test]
    fn test_oversized_line_across_chunks_skipped() {
        let mut parser = EventStreamParser::with_max_event_size(16);
        let long = "x".repeat(40);

        assert_eq!(
            events(parser.feed(b"data: before\n\ndata: doomed\ndata: ")),
            vec![Event::new(None, "before", None)]
        );
        for _ in 0..3 {
            assert!(parser.feed(long.as_bytes()).is_empty());
            assert!(parser.pending_len() <= 16 + FIELD_PREFIX_LEN);
        }

        // The rest of the block is skipped, the stream continues after it
        let outputs = parser.feed(b"\ndata: still skipped\n\ndata: ok\n\n");
        assert_eq!(events(outputs), vec![Event::new(None, "ok", None)]);
    }

    #[test]
    fn test_oversized_line_same_outcome_for_any_chunking() {
        let input = b"data: 0123456789012345678901234\n\ndata: ok\n\n";
        for size in 1..=input.len() {
            let mut parser = EventStreamParser::with_max_event_size(16);
            assert_eq!(
                events(feed_in_chunks(&mut parser, input, size)),
                vec![Event::new(None, "ok", None)],
                "chunk size {size}"
            );
        }
    }

    #[test]
    fn test_invalid_utf8_line_dropped() {
        let mut parser = EventStreamParser::new();
        let outputs = parser.feed(b"data: \xC3\x28\ndata: fine\n\n");
        assert_eq!(events(outputs), vec![Event::new(None, "fine", None)]);
    }

    #[test]
    fn test_reset_discards_partial_event() {
        let mut parser = EventStreamParser::new();
        assert!(parser.feed(b"data: stale\ndata: half").is_empty());
        assert_eq!(parser.pending_len(), 10);

        parser.reset();
        assert_eq!(parser.pending_len(), 0);
        assert_eq!(
            events(parser.feed(b"data: fresh\n\n")),
            vec![Event::new(None, "fresh", None)]
        );
    }
}
