//! Minimal HTTP/1.1 plumbing: endpoint URLs, response heads, chunked bodies
//! and multipart request bodies.
//!
//! Only the pieces the viewer needs are covered: plain `http://` endpoints,
//! `GET` and `POST`, and `Content-Length`, chunked or close-delimited bodies.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1, take_while_m_n},
    character::complete::{char, space0, space1},
    combinator::{map_res, opt, rest},
    sequence::{preceded, terminated, tuple},
    IResult,
};
use thiserror::Error;

/// Upper bound on a response head before the peer is considered broken
pub const MAX_HEAD_LEN: usize = 16 * 1024;

const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Errors from endpoint URL parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointError {
    #[error("unsupported URL scheme in {0:?} (only http:// is supported)")]
    UnsupportedScheme(String),

    #[error("endpoint URL {0:?} has no host")]
    MissingHost(String),

    #[error("invalid port in endpoint URL {0:?}")]
    InvalidPort(String),
}

/// Errors from the HTTP transport.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed HTTP response: {0}")]
    Malformed(String),

    #[error("response head exceeds 16 KiB")]
    HeadTooLarge,

    #[error("invalid chunked encoding: {0}")]
    BadChunk(String),

    #[error("connection closed before the response completed")]
    Closed,

    #[error("HTTP {status} {reason}")]
    Status { status: u16, reason: String },
}

/// A parsed `http://host[:port][/base]` endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    base_path: String,
}

impl Endpoint {
    pub fn parse(url: &str) -> Result<Self, EndpointError> {
        let trimmed = url.trim();
        let remainder = trimmed
            .strip_prefix("http://")
            .ok_or_else(|| EndpointError::UnsupportedScheme(trimmed.to_string()))?;

        let (authority, path) = match remainder.find('/') {
            Some(i) => (&remainder[..i], &remainder[i..]),
            None => (remainder, ""),
        };
        let (host, port) = match authority.rsplit_once(':') {
            // Bracketed IPv6 literals keep their inner colons
            Some((host, port)) if !port.contains(']') => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| EndpointError::InvalidPort(trimmed.to_string()))?;
                (host, port)
            }
            _ => (authority, 80),
        };
        if host.is_empty() {
            return Err(EndpointError::MissingHost(trimmed.to_string()));
        }

        Ok(Self {
            host: host.to_string(),
            port,
            base_path: path.trim_end_matches('/').to_string(),
        })
    }

    /// `host:port` suitable for `TcpStream::connect`
    pub fn socket_addr(&self) -> String {
        let host = self.host.trim_start_matches('[').trim_end_matches(']');
        if host.contains(':') {
            format!("[{}]:{}", host, self.port)
        } else {
            format!("{}:{}", host, self.port)
        }
    }

    /// Value of the `Host` header
    pub fn authority(&self) -> String {
        if self.port == 80 {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Request target for `name` below the endpoint, e.g. `/base/events`.
    /// An empty name addresses the endpoint URL itself.
    pub fn path(&self, name: &str) -> String {
        let name = name.trim_start_matches('/');
        if name.is_empty() && !self.base_path.is_empty() {
            return self.base_path.clone();
        }
        format!("{}/{}", self.base_path, name)
    }

    /// Absolute URL for `name` below the endpoint
    pub fn url(&self, name: &str) -> String {
        format!("http://{}{}", self.authority(), self.path(name))
    }
}

/// Status line and headers of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
}

impl ResponseHead {
    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_chunked(&self) -> bool {
        self.header("transfer-encoding")
            .map(|v| v.to_ascii_lowercase().contains("chunked"))
            .unwrap_or(false)
    }

    pub fn content_length(&self) -> Option<usize> {
        self.header("content-length").and_then(|v| v.trim().parse().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }
}

/// Try to parse a response head from the start of `buf`.
///
/// Returns `Ok(None)` while the blank line ending the head has not arrived
/// yet, otherwise the head and the number of bytes it occupied.
pub fn parse_response_head(buf: &[u8]) -> Result<Option<(ResponseHead, usize)>, HttpError> {
    let Some(end) = buf
        .windows(HEAD_TERMINATOR.len())
        .position(|w| w == HEAD_TERMINATOR)
    else {
        if buf.len() > MAX_HEAD_LEN {
            return Err(HttpError::HeadTooLarge);
        }
        return Ok(None);
    };

    let text = std::str::from_utf8(&buf[..end])
        .map_err(|_| HttpError::Malformed("response head is not UTF-8".into()))?;
    let mut lines = text.split("\r\n");
    let status_line = lines.next().unwrap_or_default();
    let (_, (status, reason)) = status_line_parser(status_line)
        .map_err(|_| HttpError::Malformed(format!("status line {:?}", status_line)))?;

    let mut headers = Vec::new();
    for line in lines {
        let (_, (name, value)) = header_line(line)
            .map_err(|_| HttpError::Malformed(format!("header line {:?}", line)))?;
        headers.push((name.to_string(), value.trim().to_string()));
    }

    Ok(Some((
        ResponseHead {
            status,
            reason: reason.to_string(),
            headers,
        },
        end + HEAD_TERMINATOR.len(),
    )))
}

fn status_line_parser(input: &str) -> IResult<&str, (u16, &str)> {
    let (input, _) = tuple((tag("HTTP/1."), alt((char('0'), char('1')))))(input)?;
    let (input, status) = preceded(
        space1,
        map_res(take_while_m_n(3, 3, |c: char| c.is_ascii_digit()), str::parse::<u16>),
    )(input)?;
    let (input, reason) = preceded(space0, rest)(input)?;
    Ok((input, (status, reason)))
}

fn header_line(input: &str) -> IResult<&str, (&str, &str)> {
    let (input, name) = terminated(
        take_while1(|c: char| c.is_ascii_graphic() && c != ':'),
        char(':'),
    )(input)?;
    let (input, value) = rest(input)?;
    Ok((input, (name, value)))
}

/// `hex-size[;extensions]`
fn chunk_size_line(input: &str) -> IResult<&str, usize> {
    let (input, size) = map_res(take_while1(|c: char| c.is_ascii_hexdigit()), |s: &str| {
        usize::from_str_radix(s, 16)
    })(input)?;
    let (input, _) = space0(input)?;
    let (input, _) = opt(preceded(char(';'), rest))(input)?;
    Ok((input, size))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkState {
    Size,
    Data(usize),
    DataEnd,
    Trailers,
    Done,
}

/// Incremental decoder for `Transfer-Encoding: chunked` bodies.
#[derive(Debug)]
pub struct ChunkedDecoder {
    buffer: Vec<u8>,
    state: ChunkState,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            state: ChunkState::Size,
        }
    }

    pub fn push_data(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// True once the terminating zero-size chunk and trailers were read
    pub fn is_done(&self) -> bool {
        self.state == ChunkState::Done
    }

    /// Decode everything currently buffered, returning the body bytes.
    pub fn decode_available(&mut self) -> Result<Vec<u8>, HttpError> {
        let mut out = Vec::new();
        loop {
            match self.state {
                ChunkState::Size => {
                    let Some(line) = self.take_line()? else { break };
                    let (_, size) = chunk_size_line(&line)
                        .map_err(|_| HttpError::BadChunk(format!("size line {:?}", line)))?;
                    self.state = if size == 0 {
                        ChunkState::Trailers
                    } else {
                        ChunkState::Data(size)
                    };
                }
                ChunkState::Data(remaining) => {
                    if self.buffer.is_empty() {
                        break;
                    }
                    let n = remaining.min(self.buffer.len());
                    out.extend(self.buffer.drain(..n));
                    self.state = if n == remaining {
                        ChunkState::DataEnd
                    } else {
                        ChunkState::Data(remaining - n)
                    };
                }
                ChunkState::DataEnd => {
                    let Some(line) = self.take_line()? else { break };
                    if !line.is_empty() {
                        return Err(HttpError::BadChunk("missing CRLF after chunk data".into()));
                    }
                    self.state = ChunkState::Size;
                }
                ChunkState::Trailers => {
                    let Some(line) = self.take_line()? else { break };
                    if line.is_empty() {
                        self.state = ChunkState::Done;
                    }
                }
                ChunkState::Done => break,
            }
        }
        Ok(out)
    }

    fn take_line(&mut self) -> Result<Option<String>, HttpError> {
        let Some(end) = self.buffer.windows(2).position(|w| w == b"\r\n") else {
            if self.buffer.len() > MAX_HEAD_LEN {
                return Err(HttpError::BadChunk("line too long".into()));
            }
            return Ok(None);
        };
        let line = String::from_utf8(self.buffer[..end].to_vec())
            .map_err(|_| HttpError::BadChunk("non UTF-8 control line".into()))?;
        self.buffer.drain(..end + 2);
        Ok(Some(line))
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialise a request head. `extra` headers are written verbatim.
pub fn request_head(
    method: &str,
    endpoint: &Endpoint,
    name: &str,
    extra: &[(&str, String)],
) -> Vec<u8> {
    let mut head = format!(
        "{} {} HTTP/1.1\r\nHost: {}\r\nUser-Agent: gyro3d/{}\r\nConnection: close\r\n",
        method,
        endpoint.path(name),
        endpoint.authority(),
        env!("CARGO_PKG_VERSION"),
    );
    for (key, value) in extra {
        head.push_str(key);
        head.push_str(": ");
        head.push_str(value);
        head.push_str("\r\n");
    }
    head.push_str("\r\n");
    head.into_bytes()
}

/// Body of a `multipart/form-data` request with a single file field.
pub fn multipart_file_body(boundary: &str, field: &str, filename: &str, contents: &[u8]) -> Vec<u8> {
    // Quotes and line breaks would break the part header
    let filename: String = filename
        .chars()
        .filter(|c| !matches!(c, '"' | '\r' | '\n'))
        .collect();

    let mut body = Vec::with_capacity(contents.len() + 256);
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}
