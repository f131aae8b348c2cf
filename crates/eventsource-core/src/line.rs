//! Byte stream to line decoding
//!
//! Lines end with LF, CR, or CRLF. A CR at the very end of a chunk is
//! ambiguous until the next chunk arrives, so the splitter remembers it and
//! swallows a leading LF in the following chunk instead of reporting an
//! extra empty line.
//!
//! The unterminated tail can be capped. Once it passes the cap its bytes are
//! dropped, and the line is reported as oversized when its terminator finally
//! arrives, so a line that never ends cannot grow the buffer without bound.

use std::ops::Deref;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// A single line without its terminator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Line {
    bytes: Vec<u8>,
    oversized: bool,
}

impl Line {
    /// Marker for a line whose content was dropped for exceeding the cap
    pub fn oversized() -> Self {
        Self {
            bytes: Vec::new(),
            oversized: true,
        }
    }

    /// Whether the content was dropped; such a line has no bytes
    pub fn is_oversized(&self) -> bool {
        self.oversized
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl Deref for Line {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl From<&[u8]> for Line {
    fn from(bytes: &[u8]) -> Self {
        Self::from(bytes.to_vec())
    }
}

impl From<Vec<u8>> for Line {
    fn from(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            oversized: false,
        }
    }
}

/// Whether the previous chunk ended in the middle of a possible CRLF
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum SplitterState {
    #[default]
    Normal,
    AfterCr,
}

/// Incremental line splitter
#[derive(Debug)]
pub struct LineSplitter {
    /// Bytes since the last terminator
    pending: Vec<u8>,
    state: SplitterState,
    /// Set until the first line of the stream has been emitted
    at_stream_start: bool,
    /// Cap on the unterminated tail
    max_line_len: usize,
    /// The current line passed the cap; its bytes are being dropped
    discarding: bool,
}

impl Default for LineSplitter {
    fn default() -> Self {
        Self::new()
    }
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::with_max_line_len(usize::MAX)
    }

    /// Splitter whose unterminated tail never holds more than `max_line_len`
    /// bytes between calls
    ///
    /// A line completed within a single chunk is returned whole regardless of
    /// its length; only bytes carried over to the next call are capped.
    pub fn with_max_line_len(max_line_len: usize) -> Self {
        Self {
            pending: Vec::new(),
            state: SplitterState::Normal,
            at_stream_start: true,
            max_line_len,
            discarding: false,
        }
    }

    /// Feed a chunk and return every line it completes, in order
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Line> {
        let mut lines = Vec::new();
        if chunk.is_empty() {
            return lines;
        }

        let mut rest = chunk;
        if self.state == SplitterState::AfterCr {
            self.state = SplitterState::Normal;
            if rest[0] == b'\n' {
                rest = &rest[1..];
            }
        }

        while let Some(pos) = rest.iter().position(|&b| b == b'\n' || b == b'\r') {
            if !self.discarding {
                self.pending.extend_from_slice(&rest[..pos]);
            }
            lines.push(self.take_line());

            let terminator = rest[pos];
            rest = &rest[pos + 1..];
            if terminator == b'\r' {
                match rest.first() {
                    Some(b'\n') => rest = &rest[1..],
                    Some(_) => {}
                    None => self.state = SplitterState::AfterCr,
                }
            }
        }

        if !self.discarding {
            self.pending.extend_from_slice(rest);
            if self.pending.len() > self.max_line_len {
                self.pending = Vec::new();
                self.discarding = true;
            }
        }
        lines
    }

    /// Forget all partial state, as for a fresh stream
    pub fn reset(&mut self) {
        self.pending.clear();
        self.state = SplitterState::Normal;
        self.at_stream_start = true;
        self.discarding = false;
    }

    /// Number of buffered bytes not yet terminated
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn max_line_len(&self) -> usize {
        self.max_line_len
    }

    #[cfg(test)]
    pub(crate) fn pending(&self) -> &[u8] {
        &self.pending
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> SplitterState {
        self.state
    }

    fn take_line(&mut self) -> Line {
        if self.discarding {
            self.discarding = false;
            self.at_stream_start = false;
            return Line::oversized();
        }

        let mut line = std::mem::take(&mut self.pending);
        if self.at_stream_start {
            self.at_stream_start = false;
            if line.starts_with(UTF8_BOM) {
                line.drain(..UTF8_BOM.len());
            }
        }
        Line::from(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lines_of(lines: Vec<Line>) -> Vec<String> {
        lines
            .into_iter()
            .map(|l| String::from_utf8(l.into_bytes()).unwrap())
            .collect()
    }

    fn split_whole(input: &[u8]) -> Vec<String> {
        lines_of(LineSplitter::new().feed(input))
    }

    fn split_bytewise(input: &[u8]) -> Vec<String> {
        let mut splitter = LineSplitter::new();
        let mut lines = Vec::new();
        for b in input {
            lines.extend(splitter.feed(std::slice::from_ref(b)));
        }
        lines_of(lines)
    }

    #[test]
    fn test_all_terminators() {
        assert_eq!(split_whole(b"a\nb\rc\r\nd\n"), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_blank_lines_preserved() {
        assert_eq!(split_whole(b"a\n\nb\r\n\r\n"), vec!["a", "", "b", ""]);
        assert_eq!(split_whole(b"\r\r"), vec!["", ""]);
    }

    #[test]
    fn test_crlf_split_across_chunks() {
        let mut splitter = LineSplitter::new();
        assert_eq!(lines_of(splitter.feed(b"data: x\r")), vec!["data: x"]);
        assert_eq!(splitter.state(), SplitterState::AfterCr);

        // The LF completes the CRLF and must not produce an empty line
        assert_eq!(lines_of(splitter.feed(b"\n")), Vec::<String>::new());
        assert_eq!(splitter.state(), SplitterState::Normal);

        assert_eq!(lines_of(splitter.feed(b"\r\n")), vec![""]);
    }

    #[test]
    fn test_cr_followed_by_other_byte() {
        let mut splitter = LineSplitter::new();
        assert_eq!(lines_of(splitter.feed(b"a\r")), vec!["a"]);
        assert_eq!(lines_of(splitter.feed(b"b\n")), vec!["b"]);
    }

    #[test]
    fn test_cr_then_cr_across_chunks() {
        let mut splitter = LineSplitter::new();
        assert_eq!(lines_of(splitter.feed(b"a\r")), vec!["a"]);
        assert_eq!(lines_of(splitter.feed(b"\r")), vec![""]);
        assert_eq!(lines_of(splitter.feed(b"\n")), Vec::<String>::new());
    }

    #[test]
    fn test_unterminated_tail_stays_pending() {
        let mut splitter = LineSplitter::new();
        assert!(splitter.feed(b"data: partial").is_empty());
        assert_eq!(splitter.pending(), b"data: partial");
        assert_eq!(splitter.pending_len(), 13);

        assert_eq!(lines_of(splitter.feed(b" line\n")), vec!["data: partial line"]);
        assert_eq!(splitter.pending_len(), 0);
    }

    #[test]
    fn test_empty_chunk_is_noop() {
        let mut splitter = LineSplitter::new();
        splitter.feed(b"x\r");
        assert!(splitter.feed(b"").is_empty());
        assert_eq!(splitter.state(), SplitterState::AfterCr);
        assert!(splitter.feed(b"\n").is_empty());
    }

    #[test]
    fn test_chunk_boundary_invariance() {
        let inputs: [&[u8]; 5] = [
            b"data: hello\n\n",
            b"data: a\r\ndata: b\r\n\r\n",
            b": comment\rdata: x\r\rid: 1\n\r\n",
            b"\r\n\r\n\n\r\r\n",
            b"event: a\r\ndata\r\n\r",
        ];

        for input in inputs {
            let whole = split_whole(input);
            assert_eq!(split_bytewise(input), whole);

            for cut in 0..=input.len() {
                let mut splitter = LineSplitter::new();
                let mut lines = splitter.feed(&input[..cut]);
                lines.extend(splitter.feed(&input[cut..]));
                assert_eq!(lines_of(lines), whole, "cut at {cut}");
            }
        }
    }

    #[test]
    fn test_bom_stripped_at_stream_start_only() {
        assert_eq!(
            split_whole(b"\xEF\xBB\xBFdata: x\n\xEF\xBB\xBFy\n"),
            vec!["data: x".to_string(), "\u{feff}y".to_string()]
        );

        // BOM split across chunks
        let mut splitter = LineSplitter::new();
        assert!(splitter.feed(b"\xEF\xBB").is_empty());
        assert_eq!(lines_of(splitter.feed(b"\xBFa\n")), vec!["a"]);
    }

    #[test]
    fn test_tail_over_cap_is_dropped() {
        let mut splitter = LineSplitter::with_max_line_len(8);
        assert!(splitter.feed(b"data: 0123").is_empty());
        assert_eq!(splitter.pending_len(), 0);
        assert!(splitter.feed(b"456789").is_empty());
        assert_eq!(splitter.pending_len(), 0);

        let lines = splitter.feed(b"tail\ndata: ok\n");
        assert_eq!(lines.len(), 2);
        assert!(lines[0].is_oversized());
        assert!(lines[0].is_empty());
        assert!(!lines[1].is_oversized());
        assert_eq!(lines[1].as_bytes(), b"data: ok");
    }

    #[test]
    fn test_tail_cap_with_crlf_terminator() {
        let mut splitter = LineSplitter::with_max_line_len(4);
        assert!(splitter.feed(b"abcdefgh").is_empty());

        let lines = splitter.feed(b"ij\r");
        assert_eq!(lines, vec![Line::oversized()]);
        assert_eq!(lines_of(splitter.feed(b"\n\r\n")), vec![""]);
    }

    #[test]
    fn test_long_line_within_one_chunk_is_whole() {
        let mut splitter = LineSplitter::with_max_line_len(4);
        assert_eq!(lines_of(splitter.feed(b"abcdefgh\n")), vec!["abcdefgh"]);

        // At the cap the tail is still kept
        assert!(splitter.feed(b"abcd").is_empty());
        assert_eq!(splitter.pending(), b"abcd");
        assert_eq!(lines_of(splitter.feed(b"\n")), vec!["abcd"]);
    }

    #[test]
    fn test_reset_clears_partial_state() {
        let mut splitter = LineSplitter::new();
        splitter.feed(b"first\nhalf\r");
        splitter.reset();
        assert_eq!(splitter.pending_len(), 0);
        assert_eq!(splitter.state(), SplitterState::Normal);

        // A leading LF is a line of its own after reset
        assert_eq!(lines_of(splitter.feed(b"\n")), vec![""]);

        splitter.reset();
        assert_eq!(lines_of(splitter.feed(b"\xEF\xBB\xBFz\n")), vec!["z"]);
    }

    #[test]
    fn test_reset_ends_discarding() {
        let mut splitter = LineSplitter::with_max_line_len(2);
        splitter.feed(b"abc");
        splitter.reset();
        assert_eq!(lines_of(splitter.feed(b"x\n")), vec!["x"]);
    }
}
