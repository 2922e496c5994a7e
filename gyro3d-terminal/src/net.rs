//! Async HTTP/1.1 client over plain TCP.
//!
//! One request per connection (`Connection: close`). Response heads and
//! chunked bodies are decoded with the parsers in `gyro3d_core::http`.

use std::time::Duration;

use gyro3d_core::http::{self, ChunkedDecoder, ResponseHead};
use gyro3d_core::{Endpoint, HttpError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// TCP connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

const READ_BUF_LEN: usize = 8192;

/// Largest body `read_to_end` accepts (model files).
pub const MAX_BODY_LEN: usize = 64 * 1024 * 1024;

enum Framing {
    Length(usize),
    Chunked(ChunkedDecoder),
    UntilClose { closed: bool },
}

/// Streaming response body.
pub struct Body {
    stream: TcpStream,
    pending: Vec<u8>,
    framing: Framing,
}

impl Body {
    fn is_complete(&self) -> bool {
        match &self.framing {
            Framing::Length(remaining) => *remaining == 0,
            Framing::Chunked(decoder) => decoder.is_done(),
            Framing::UntilClose { closed } => *closed,
        }
    }

    /// Next piece of decoded body, `None` once the body is complete.
    pub async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, HttpError> {
        let mut buf = [0u8; READ_BUF_LEN];
        loop {
            if !self.pending.is_empty() {
                let data = std::mem::take(&mut self.pending);
                let out = match &mut self.framing {
                    Framing::Length(remaining) => {
                        let n = (*remaining).min(data.len());
                        *remaining -= n;
                        data[..n].to_vec()
                    }
                    Framing::Chunked(decoder) => {
                        decoder.push_data(&data);
                        decoder.decode_available()?
                    }
                    Framing::UntilClose { .. } => data,
                };
                if !out.is_empty() {
                    return Ok(Some(out));
                }
            }

            if self.is_complete() {
                return Ok(None);
            }

            let n = self.stream.read(&mut buf).await?;
            if n == 0 {
                return match &mut self.framing {
                    Framing::UntilClose { closed } => {
                        *closed = true;
                        Ok(None)
                    }
                    _ => Err(HttpError::Closed),
                };
            }
            self.pending.extend_from_slice(&buf[..n]);
        }
    }

    /// Collect the whole body, refusing anything above `limit` bytes.
    pub async fn read_to_end(&mut self, limit: usize) -> Result<Vec<u8>, HttpError> {
        let mut body = Vec::new();
        while let Some(chunk) = self.next_chunk().await? {
            body.extend_from_slice(&chunk);
            if body.len() > limit {
                return Err(HttpError::Malformed(format!("body larger than {} bytes", limit)));
            }
        }
        Ok(body)
    }
}

/// A response whose head has been read and whose body is still on the wire.
pub struct Response {
    pub head: ResponseHead,
    pub body: Body,
}

/// Send one request and wait for the response head.
///
/// A `Content-Length` header is added for non-empty bodies.
pub async fn send(
    endpoint: &Endpoint,
    method: &str,
    name: &str,
    headers: &[(&str, String)],
    body: &[u8],
) -> Result<Response, HttpError> {
    let addr = endpoint.socket_addr();
    let mut stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&addr))
        .await
        .map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("connecting to {} timed out", addr),
            )
        })??;

    let mut all_headers: Vec<(&str, String)> = headers.to_vec();
    if !body.is_empty() {
        all_headers.push(("Content-Length", body.len().to_string()));
    }
    let mut request = http::request_head(method, endpoint, name, &all_headers);
    request.extend_from_slice(body);
    stream.write_all(&request).await?;
    tracing::debug!(%method, path = %endpoint.path(name), %addr, "Sent HTTP request");

    let mut buffer = Vec::new();
    let mut chunk = [0u8; READ_BUF_LEN];
    loop {
        if let Some((head, used)) = http::parse_response_head(&buffer)? {
            let pending = buffer.split_off(used);
            let framing = if head.is_chunked() {
                Framing::Chunked(ChunkedDecoder::new())
            } else if let Some(length) = head.content_length() {
                Framing::Length(length)
            } else {
                Framing::UntilClose { closed: false }
            };
            return Ok(Response {
                head,
                body: Body {
                    stream,
                    pending,
                    framing,
                },
            });
        }

        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(HttpError::Closed);
        }
        buffer.extend_from_slice(&chunk[..n]);
    }
}

/// `GET {endpoint}/{name}` and collect the body.
pub async fn get(endpoint: &Endpoint, name: &str) -> Result<(ResponseHead, Vec<u8>), HttpError> {
    let mut response = send(endpoint, "GET", name, &[], &[]).await?;
    let body = response.body.read_to_end(MAX_BODY_LEN).await?;
    Ok((response.head, body))
}

#[cfg(test)]
pub(crate) mod testing {
    //! Tiny scripted HTTP server for the async tests in this crate.

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    pub async fn listener() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        (listener, url)
    }

    /// Read one request (head plus `Content-Length` body) from `stream`.
    pub async fn read_request(stream: &mut TcpStream) -> (String, Vec<u8>) {
        let mut data = Vec::new();
        let mut buf = [0u8; 4096];
        let head_end = loop {
            if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "client closed before sending a request");
            data.extend_from_slice(&buf[..n]);
        };
        let head = String::from_utf8(data[..head_end].to_vec()).unwrap();
        let length = head
            .lines()
            .find_map(|l| l.strip_prefix("Content-Length: "))
            .map(|v| v.trim().parse::<usize>().unwrap())
            .unwrap_or(0);
        while data.len() < head_end + length {
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0);
            data.extend_from_slice(&buf[..n]);
        }
        (head, data[head_end..head_end + length].to_vec())
    }

    /// Answer with a complete response and close.
    pub async fn respond(stream: &mut TcpStream, status: &str, body: &[u8]) {
        let head = format!(
            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            status,
            body.len()
        );
        stream.write_all(head.as_bytes()).await.unwrap();
        stream.write_all(body).await.unwrap();
        stream.shutdown().await.ok();
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[tokio::test]
    async fn test_get_with_content_length() {
        let (listener, url) = listener().await;
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let (head, _) = read_request(&mut stream).await;
            respond(&mut stream, "200 OK", b"hello").await;
            head
        });

        let endpoint = Endpoint::parse(&url).unwrap();
        let (head, body) = get(&endpoint, "reset").await.unwrap();
        assert_eq!(head.status, 200);
        assert_eq!(body, b"hello");

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /reset HTTP/1.1\r\n"));
    }

    #[tokio::test]
    async fn test_chunked_body() {
        let (listener, url) = listener().await;
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_request(&mut stream).await;
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc\r\n")
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
            stream.write_all(b"2\r\nde\r\n0\r\n\r\n").await.unwrap();
        });

        let endpoint = Endpoint::parse(&url).unwrap();
        let (_, body) = get(&endpoint, "x").await.unwrap();
        assert_eq!(body, b"abcde");
    }

    #[tokio::test]
    async fn test_body_until_close() {
        let (listener, url) = listener().await;
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_request(&mut stream).await;
            stream
                .write_all(b"HTTP/1.0 200 OK\r\n\r\nstreamed")
                .await
                .unwrap();
        });

        let endpoint = Endpoint::parse(&url).unwrap();
        let (_, body) = get(&endpoint, "x").await.unwrap();
        assert_eq!(body, b"streamed");
    }

    #[tokio::test]
    async fn test_truncated_body_is_an_error() {
        let (listener, url) = listener().await;
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_request(&mut stream).await;
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nabc")
                .await
                .unwrap();
        });

        let endpoint = Endpoint::parse(&url).unwrap();
        assert!(matches!(get(&endpoint, "x").await, Err(HttpError::Closed)));
    }

    #[tokio::test]
    async fn test_post_sends_content_length() {
        let (listener, url) = listener().await;
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request = read_request(&mut stream).await;
            respond(&mut stream, "204 No Content", b"").await;
            request
        });

        let endpoint = Endpoint::parse(&url).unwrap();
        let mut response = send(&endpoint, "POST", "upload", &[], b"payload").await.unwrap();
        assert_eq!(response.head.status, 204);
        assert!(response.body.read_to_end(16).await.unwrap().is_empty());

        let (head, body) = server.await.unwrap();
        assert!(head.contains("Content-Length: 7\r\n"));
        assert_eq!(body, b"payload");
    }
}
