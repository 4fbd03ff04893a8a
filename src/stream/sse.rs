//! Incremental decoder for `text/event-stream` bodies.

/// Longest line the decoder buffers before giving up on the stream.
pub const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event name, `message` when the server sent none.
    pub event: String,
    /// Data lines joined with `\n`.
    pub data: String,
    /// Last event id seen on the stream.
    pub id: Option<String>,
}

/// A line grew past the decoder's limit without a line ending.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("line longer than {limit} bytes")]
pub struct LineTooLong {
    /// Limit that was exceeded
    pub limit: usize,
}

/// Splits a byte stream into [`SseEvent`]s.
///
/// Lines end with LF, CRLF or a bare CR. Chunks may split lines, CRLF pairs or
/// UTF-8 sequences anywhere; only complete lines are interpreted. An event is
/// dispatched on the blank line that ends it, and a trailing event without its
/// blank line is discarded at end of stream.
#[derive(Debug)]
pub struct SseDecoder {
    line: Vec<u8>,
    max_line: usize,
    after_cr: bool,
    event: Option<String>,
    data: String,
    has_data: bool,
    last_id: Option<String>,
    seen_first_line: bool,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_LENGTH)
    }
}

impl SseDecoder {
    /// Fresh decoder with the default line limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh decoder that rejects lines longer than `max_line` bytes.
    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            line: Vec::new(),
            max_line,
            after_cr: false,
            event: None,
            data: String::new(),
            has_data: false,
            last_id: None,
            seen_first_line: false,
        }
    }

    /// Feeds a chunk and returns every event completed by it.
    ///
    /// # Errors
    /// Returns [`LineTooLong`] once the pending line exceeds the limit; the
    /// decoder should not be fed again afterwards.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<SseEvent>, LineTooLong> {
        let mut events = Vec::new();

        for &byte in chunk {
            if std::mem::take(&mut self.after_cr) && byte == b'\n' {
                continue;
            }

            match byte {
                b'\r' | b'\n' => {
                    self.after_cr = byte == b'\r';
                    let line = std::mem::take(&mut self.line);
                    if let Some(event) = self.process_line(&String::from_utf8_lossy(&line)) {
                        events.push(event);
                    }
                }
                _ if self.line.len() >= self.max_line => {
                    return Err(LineTooLong {
                        limit: self.max_line,
                    });
                }
                _ => self.line.push(byte),
            }
        }

        Ok(events)
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        let line = if self.seen_first_line {
            line
        } else {
            self.seen_first_line = true;
            line.strip_prefix('\u{feff}').unwrap_or(line)
        };

        if line.is_empty() {
            return self.dispatch();
        }

        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            "id" if !value.contains('\0') => self.last_id = Some(value.to_string()),
            _ => {}
        }

        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();

        if !self.has_data {
            return None;
        }

        self.has_data = false;
        Some(SseEvent {
            event: event
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| "message".to_string()),
            data: std::mem::take(&mut self.data),
            id: self.last_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn decodes_named_event() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"event: state\ndata: {\"a\":1}\n\n").unwrap();

        assert_eq!(
            events,
            vec![SseEvent {
                event: "state".into(),
                data: "{\"a\":1}".into(),
                id: None,
            }]
        );
    }

    #[test]
    fn events_split_across_chunks_and_crlf() {
        let mut decoder = SseDecoder::new();

        assert!(decoder.feed(b"event: st").unwrap().is_empty());
        assert!(decoder.feed(b"ate\r\ndata: x").unwrap().is_empty());
        let events = decoder.feed(b"y\r\n\r\n").unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "state");
        assert_eq!(events[0].data, "xy");
    }

    #[test]
    fn multibyte_characters_survive_chunk_boundaries() {
        let mut decoder = SseDecoder::new();
        let payload = "data: caf\u{e9}\n\n".as_bytes();
        let (head, tail) = payload.split_at(10);

        assert!(decoder.feed(head).unwrap().is_empty());
        assert_eq!(decoder.feed(tail).unwrap()[0].data, "caf\u{e9}");
    }

    #[test]
    fn multiple_data_lines_are_joined() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: a\ndata:b\n\n").unwrap();

        assert_eq!(events[0].data, "a\nb");
        assert_eq!(events[0].event, "message");
    }

    #[test]
    fn comments_and_empty_events_are_ignored() {
        let mut decoder = SseDecoder::new();
        let events = decoder
            .feed(b": keepalive\n\nevent: state\n\nid: 7\ndata: z\n\n")
            .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "message");
        assert_eq!(events[0].id.as_deref(), Some("7"));
    }

    #[test]
    fn unterminated_event_is_not_dispatched() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"event: state\ndata: partial\n").unwrap().is_empty());
    }

    #[test]
    fn bare_carriage_returns_end_lines() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"event: state\rdata: cr\r\r").unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "state");
        assert_eq!(events[0].data, "cr");
    }

    #[test]
    fn crlf_split_between_chunks_is_one_line_ending() {
        let mut decoder = SseDecoder::new();

        assert!(decoder.feed(b"data: a\r").unwrap().is_empty());
        assert!(decoder.feed(b"\ndata: b\r").unwrap().is_empty());
        let events = decoder.feed(b"\n\r\n").unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "a\nb");
    }

    #[test]
    fn overlong_line_is_rejected() {
        let mut decoder = SseDecoder::with_max_line(16);

        assert!(decoder.feed(b"data: 0123456789").unwrap().is_empty());
        assert_eq!(decoder.feed(b"abcdef"), Err(LineTooLong { limit: 16 }));
    }

    #[test]
    fn long_lines_within_the_limit_are_kept() {
        let mut decoder = SseDecoder::with_max_line(16);
        let events = decoder.feed(b"data: 0123456789\n\n").unwrap();

        assert_eq!(events[0].data, "0123456789");
    }
}
