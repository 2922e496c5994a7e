/// Incremental decoder for `text/event-stream` bodies
use nom::{
    bytes::complete::take_till,
    character::complete::char,
    combinator::{opt, rest},
    sequence::preceded,
    IResult,
};

/// Event name used when a frame carries no `event:` field
pub const DEFAULT_EVENT: &str = "message";

/// Longest unterminated line kept while waiting for its end
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// One dispatched server-sent event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Streaming parser for server-sent events.
///
/// Feed body bytes via `push_data`, then drain complete events via
/// `next_event`. Frames may be split across any number of reads.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append received body bytes to the internal buffer.
    pub fn push_data(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Extract the next complete event, or `None` until more data arrives.
    pub fn next_event(&mut self) -> Option<SseEvent> {
        while let Some(line) = self.next_line() {
            if line.is_empty() {
                if let Some(event) = self.dispatch() {
                    return Some(event);
                }
                continue;
            }

            let Ok((_, (name, value))) = field_line(&line) else {
                continue;
            };
            match name {
                // Comment line
                "" => {}
                // An empty name falls back to the default at dispatch
                "event" => self.event = Some(value.to_string()).filter(|e| !e.is_empty()),
                "data" => self.data.push(value.to_string()),
                // id and retry do not affect dispatch here
                _ => {}
            }
        }
        None
    }

    /// Pop one line terminated by `\n`, `\r\n` or a lone `\r`
    fn next_line(&mut self) -> Option<String> {
        let Some(end) = self.buffer.iter().position(|&b| b == b'\n' || b == b'\r') else {
            if self.buffer.len() > MAX_LINE_LEN {
                tracing::warn!(bytes = self.buffer.len(), "Discarding oversized event stream line");
                self.buffer.clear();
                self.event = None;
                self.data.clear();
            }
            return None;
        };
        let consumed = if self.buffer[end] == b'\r' {
            // A trailing CR may be the first half of CRLF
            match self.buffer.get(end + 1) {
                Some(b'\n') => end + 2,
                Some(_) => end + 1,
                None => return None,
            }
        } else {
            end + 1
        };

        let line = String::from_utf8_lossy(&self.buffer[..end]).into_owned();
        self.buffer.drain(..consumed);
        Some(line)
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            event: event.unwrap_or_else(|| DEFAULT_EVENT.to_string()),
            data,
        })
    }
}

/// `name[: value]`, stripping a single space after the colon
fn field_line(input: &str) -> IResult<&str, (&str, &str)> {
    let (input, name) = take_till(|c| c == ':')(input)?;
    let (input, value) = opt(preceded(char(':'), preceded(opt(char(' ')), rest)))(input)?;
    Ok((input, (name, value.unwrap_or(""))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(parser: &mut SseParser) -> Vec<SseEvent> {
        std::iter::from_fn(|| parser.next_event()).collect()
    }

    #[test]
    fn test_named_data_event() {
        let mut parser = SseParser::new();
        parser.push_data(b"event: data\ndata: {\"x\":1,\"y\":2,\"z\":3}\n\n");
        let events = drain(&mut parser);
        assert_eq!(
            events,
            vec![SseEvent {
                event: "data".into(),
                data: "{\"x\":1,\"y\":2,\"z\":3}".into(),
            }]
        );
    }

    #[test]
    fn test_default_event_name_and_multiline_data() {
        let mut parser = SseParser::new();
        parser.push_data(b"data: first\ndata:second\n\n");
        let event = parser.next_event().unwrap();
        assert_eq!(event.event, DEFAULT_EVENT);
        assert_eq!(event.data, "first\nsecond");
    }

    #[test]
    fn test_fragmented_crlf_stream() {
        let stream = b": keepalive\r\nevent: data\r\ndata: {\"x\":0}\r\n\r\nevent: data\r\ndata: 2\r\n\r\n";
        let mut whole = SseParser::new();
        whole.push_data(stream);
        let expected = drain(&mut whole);
        assert_eq!(expected.len(), 2);

        // Byte-at-a-time delivery must decode identically
        let mut parser = SseParser::new();
        let mut events = Vec::new();
        for byte in stream.iter() {
            parser.push_data(std::slice::from_ref(byte));
            events.extend(drain(&mut parser));
        }
        assert_eq!(events, expected);
    }

    #[test]
    fn test_lone_cr_line_endings() {
        let mut parser = SseParser::new();
        parser.push_data(b"event: data\rdata: 7\r\r ");
        assert_eq!(parser.next_event().unwrap().data, "7");
    }

    #[test]
    fn test_event_without_data_is_not_dispatched() {
        let mut parser = SseParser::new();
        parser.push_data(b"event: open\n\ndata: after\n\n");
        let event = parser.next_event().unwrap();
        // The name from the empty frame must not leak into the next one
        assert_eq!(event.event, DEFAULT_EVENT);
        assert_eq!(event.data, "after");
        assert!(parser.next_event().is_none());
    }

    #[test]
    fn test_incomplete_frame_waits() {
        let mut parser = SseParser::new();
        parser.push_data(b"event: data\ndata: 1\n");
        assert!(parser.next_event().is_none());
        parser.push_data(b"\n");
        assert_eq!(parser.next_event().unwrap().data, "1");
    }

    #[test]
    fn test_empty_event_name_uses_default() {
        let mut parser = SseParser::new();
        parser.push_data(b"event:
data: 1

");
        assert_eq!(parser.next_event().unwrap().event, DEFAULT_EVENT);
    }

    #[test]
    fn test_oversized_line_is_discarded() {
        let mut parser = SseParser::new();
        parser.push_data(b"event: data
");
        parser.push_data(&vec![b'x'; MAX_LINE_LEN + 1]);
        assert!(parser.next_event().is_none());
        assert!(parser.buffer.is_empty());

        // The stream recovers at the next frame
        parser.push_data(b"

event: data
data: 5

");
        let event = parser.next_event().unwrap();
        assert_eq!(event.event, "data");
        assert_eq!(event.data, "5");
    }

    #[test]
    fn test_ignores_id_and_retry() {
        let mut parser = SseParser::new();
        parser.push_data(b"id: 4\nretry: 1000\nevent: data\ndata: ok\n\n");
        let event = parser.next_event().unwrap();
        assert_eq!(event.event, "data");
        assert_eq!(event.data, "ok");
    }
}
