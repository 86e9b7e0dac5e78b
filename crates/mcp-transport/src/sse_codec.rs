//! SSE event framing shared by the legacy two-endpoint transport and the
//! streamable HTTP transport's upgrade path (§4.3.3 "Buffering").
//!
//! A per-connection byte buffer accumulates chunks and splits on `\r\n\r\n`
//! or `\n\n`; partial events never dispatch.

/// One decoded `(id?, event?, data)` SSE event. `data` is the concatenation
/// of every `data:` line in the event, joined by `\n`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub id: Option<String>,
    pub event: Option<String>,
    pub data: String,
}

impl SseEvent {
    fn parse(raw: &str) -> Self {
        let mut id = None;
        let mut event = None;
        let mut data_lines = Vec::new();

        for line in raw.lines() {
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "id" => id = Some(value.to_string()),
                "event" => event = Some(value.to_string()),
                "data" => data_lines.push(value.to_string()),
                // "retry" and unknown fields carry no information this
                // client acts on.
                _ => {}
            }
        }

        Self { id, event, data: data_lines.join("\n") }
    }
}

/// Accumulates raw bytes across chunk boundaries and yields complete events
/// as they become available.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
}

impl SseDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk of bytes (assumed UTF-8, lossily decoded otherwise) and
    /// returns every complete event now available, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));
        let mut events = Vec::new();

        loop {
            let split = find_double_newline(&self.buffer);
            let Some((start, len)) = split else { break };
            let raw: String = self.buffer.drain(..start + len).collect();
            let raw = &raw[..start];
            if raw.trim().is_empty() {
                continue;
            }
            events.push(SseEvent::parse(raw));
        }

        events
    }
}

/// Finds the first `\n\n` or `\r\n\r\n`, returning `(start_index, separator_len)`.
fn find_double_newline(buffer: &str) -> Option<(usize, usize)> {
    if let Some(pos) = buffer.find("\r\n\r\n") {
        return Some((pos, 4));
    }
    buffer.find("\n\n").map(|pos| (pos, 2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_multi_line_data_joined_by_newline() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"event: message\nid: 7\ndata: {\"a\":1}\ndata: more\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.as_deref(), Some("message"));
        assert_eq!(events[0].id.as_deref(), Some("7"));
        assert_eq!(events[0].data, "{\"a\":1}\nmore");
    }

    #[test]
    fn partial_event_never_dispatches() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"event: message\ndata: partial");
        assert!(events.is_empty());
        let events = decoder.push(b"\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "partial");
    }

    #[test]
    fn splits_on_crlf_separator() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: x\r\n\r\ndata: y\r\n\r\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "x");
        assert_eq!(events[1].data, "y");
    }

    #[test]
    fn handles_split_chunk_boundaries() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: hel").is_empty());
        assert!(decoder.push(b"lo\n").is_empty());
        let events = decoder.push(b"\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "hello");
    }
}
