use crate::{
    http::types::{decode_text, HeaderMap},
    limits::DEFAULT_MAX_HEADERS,
    Method,
};
use memchr::{memchr, memchr_iter};
use std::{
    io,
    net::{IpAddr, Ipv4Addr, SocketAddr},
};
use tokio::net::TcpStream;

/// HTTP request as read from a single burst of bytes.
///
/// The parser is lenient and never fails: input it cannot make
/// sense of produces an empty or partial request, and the router turns that
/// into a `4xx` response.
///
/// # Input format
///
/// - Lines are separated by `LF`; surrounding whitespace (including `CR`)
///   is trimmed from every line.
/// - The first line is `[METHOD] SP [PATH] ...`. With fewer than two
///   space-separated tokens, method and path stay empty.
/// - Header lines follow until the first empty line. Each header is split at
///   its first colon; the name is trimmed and lower-cased, the value trimmed.
///   Lines without a colon, or starting with one, are skipped, and so is
///   every header once the map holds [`DEFAULT_MAX_HEADERS`] names.
/// - Everything after the empty line is the body, byte for byte. There is no
///   `Content-Length` check. Without an empty line, everything after the
///   request line is the body (and is still scanned for headers).
///
/// ```text
/// POST /api/control/[Channel1]/volume HTTP/1.1\r\n
/// Content-Type: application/json\r\n
/// \r\n
/// {"value": 0.5}
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: Option<Method>,
    path: String,
    headers: HeaderMap,
    body: Vec<u8>,

    client_addr: SocketAddr,
}

impl Request {
    const UNKNOWN_CLIENT: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0);

    #[inline(always)]
    pub(crate) fn new() -> Self {
        Request {
            method: None,
            path: String::new(),
            headers: HeaderMap::new(),
            body: Vec::new(),

            client_addr: Self::UNKNOWN_CLIENT,
        }
    }

    /// Parses a raw request buffer.
    #[inline]
    pub fn parse(data: &[u8]) -> Self {
        Self::parse_from(data, Self::UNKNOWN_CLIENT, DEFAULT_MAX_HEADERS)
    }

    /// Parses a request that arrived from `client_addr`, keeping at most
    /// `max_headers` distinct header names.
    pub(crate) fn parse_from(data: &[u8], client_addr: SocketAddr, max_headers: usize) -> Self {
        let mut request = Request::new();
        request.client_addr = client_addr;

        let (first_line, headers_start) = next_line(data, 0);
        request.parse_first_line(first_line);

        let mut pos = headers_start;
        while let Some(next) = pos {
            let (line, after) = next_line(data, next);
            let line = trim(line);

            if line.is_empty() {
                request.body = after.map(|start| data[start..].to_vec()).unwrap_or_default();
                return request;
            }

            if request.headers.len() < max_headers {
                request.parse_header(line);
            }
            pos = after;
        }

        // No terminator: the whole remainder is the body
        if let Some(start) = headers_start {
            request.body = data[start..].to_vec();
        }
        request
    }

    /// Builds a request without going through the wire format, so `path`
    /// may contain any character.
    pub(crate) fn from_parts(method: Option<Method>, path: &str, body: &[u8]) -> Self {
        Request {
            method,
            path: path.to_owned(),
            body: body.to_vec(),
            ..Request::new()
        }
    }
}

// Public API
impl Request {
    /// Peer address of the connection this request arrived on.
    #[inline(always)]
    pub const fn client_addr(&self) -> &SocketAddr {
        &self.client_addr
    }

    /// Request method, `None` if the request line was malformed or named
    /// an unknown method.
    #[inline(always)]
    pub const fn method(&self) -> Option<Method> {
        self.method
    }

    /// Raw request target, including any query string.
    #[inline(always)]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the header value with case-insensitive name matching.
    #[inline(always)]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    #[inline(always)]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Request body, empty if none was sent.
    #[inline(always)]
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

// Parse
impl Request {
    #[inline]
    fn parse_first_line(&mut self, line: &[u8]) {
        let mut tokens = trim(line).split(|&b| b == b' ');

        if let (Some(method), Some(path)) = (tokens.next(), tokens.next()) {
            self.method = Method::from_bytes(method);
            self.path = decode_text(path);
        }
    }

    #[inline]
    fn parse_header(&mut self, line: &[u8]) {
        match memchr(b':', line) {
            Some(colon) if colon > 0 => {
                let name = decode_text(trim(&line[..colon]));
                let value = decode_text(trim(&line[colon + 1..]));

                self.headers.insert(name, value);
            }
            _ => {}
        }
    }
}

/// Returns the line starting at `start` (without its `LF`) and the index of
/// the following line, if there is one.
#[inline]
fn next_line(data: &[u8], start: usize) -> (&[u8], Option<usize>) {
    let rest = &data[start..];

    match memchr_iter(b'\n', rest).next() {
        Some(end) => (&rest[..end], Some(start + end + 1)),
        None => (rest, None),
    }
}

#[inline]
fn trim(mut src: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = src {
        if !first.is_ascii_whitespace() && *first != 0x0B {
            break;
        }
        src = rest;
    }
    while let [rest @ .., last] = src {
        if !last.is_ascii_whitespace() && *last != 0x0B {
            break;
        }
        src = rest;
    }
    src
}

//

/// Outcome of reading one burst from a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Burst {
    /// The peer closed the connection before sending anything.
    Closed,
    /// At least one byte was read.
    Data,
    /// More than the allowed number of bytes arrived.
    TooLarge,
}

/// Per-connection read buffer.
#[derive(Debug)]
pub(crate) struct Parser {
    buffer: Vec<u8>,
    chunk: Box<[u8]>,
}

impl Parser {
    const CHUNK_SIZE: usize = 4096;

    #[inline(always)]
    pub(crate) fn new() -> Self {
        Parser {
            buffer: Vec::new(),
            chunk: vec![0; Self::CHUNK_SIZE].into_boxed_slice(),
        }
    }

    #[inline(always)]
    pub(crate) fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Waits until the socket is readable and drains everything that is
    /// currently available, without waiting for more.
    pub(crate) async fn fill_buffer(
        &mut self,
        stream: &TcpStream,
        max_size: usize,
    ) -> Result<Burst, io::Error> {
        loop {
            stream.readable().await?;

            let mut closed = false;
            loop {
                match stream.try_read(&mut self.chunk) {
                    Ok(0) => {
                        closed = true;
                        break;
                    }
                    Ok(n) => {
                        self.buffer.extend_from_slice(&self.chunk[..n]);
                        if self.buffer.len() > max_size {
                            return Ok(Burst::TooLarge);
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                    Err(e) => return Err(e),
                }
            }

            // Readiness can be spurious; keep waiting until bytes or EOF show up
            match (self.buffer.len(), closed) {
                (0, true) => return Ok(Burst::Closed),
                (0, false) => continue,
                _ => return Ok(Burst::Data),
            }
        }
    }
}
