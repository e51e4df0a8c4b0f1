//! HTTP response builder with fixed CORS headers and computed framing.

use crate::{
    errors::ApiError,
    http::types::{HeaderMap, StatusCode},
};
use serde::Serialize;
use std::io::Write;

/// Headers appended to every response.
const CORS_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "GET, POST, OPTIONS"),
    ("Access-Control-Allow-Headers", "Content-Type"),
];

const DEFAULT_CONTENT_TYPE: &str = "application/json";

const SERIALIZE_FAILED: &[u8] = br#"{"error":"Internal Server Error"}"#;

/// HTTP response builder for constructing server responses.
///
/// Build responses by chaining methods: optional [`status()`](Response::status)
/// and [`header()`](Response::header) calls, then exactly one finalizing
/// method ([`body()`](Response::body), [`json()`](Response::json),
/// [`error()`](Response::error) or [`empty()`](Response::empty)).
///
/// When the response is serialized the following headers are appended after
/// the handler's own:
/// - `Content-Length`: byte length of the body
/// - `Content-Type: application/json`, unless the handler set a content type
/// - `Access-Control-Allow-Origin: *`
/// - `Access-Control-Allow-Methods: GET, POST, OPTIONS`
/// - `Access-Control-Allow-Headers: Content-Type`
///
/// # Examples
/// ```
/// use control_rest::{Handled, Response, StatusCode};
///
/// fn handle(resp: &mut Response) -> Handled {
///     resp.status(StatusCode::Ok)
///         .header("content-type", "text/plain")
///         .body("Hello World")
/// }
///
/// let mut resp = Response::new();
/// handle(&mut resp);
/// assert!(resp.to_bytes().starts_with(b"HTTP/1.1 200 OK\r\n"));
/// ```
///
/// # Panics
/// Builder methods check the call order in `debug` mode and panic when a
/// method is used after the response was finalized.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    state: ResponseState,
}

/// Proof that a handler finalized its response.
#[doc(hidden)]
#[derive(Debug)]
pub struct Handled(());

#[derive(Debug, Clone, Copy, PartialEq)]
enum ResponseState {
    Building,
    Complete,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    /// Creates an empty `200 OK` response.
    #[inline(always)]
    pub fn new() -> Self {
        Self {
            status: StatusCode::Ok,
            headers: HeaderMap::new(),
            body: Vec::new(),
            state: ResponseState::Building,
        }
    }

    #[inline(always)]
    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    #[inline(always)]
    pub fn body_bytes(&self) -> &[u8] {
        &self.body
    }

    #[inline(always)]
    pub fn is_complete(&self) -> bool {
        self.state == ResponseState::Complete
    }
}

// Builder
impl Response {
    /// Sets the HTTP status code (default: `200 OK`).
    ///
    /// # Panics
    /// Error message: `Must be called before any finalizing method`
    #[inline]
    #[track_caller]
    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        debug_assert!(
            self.state == ResponseState::Building,
            "Must be called before any finalizing method"
        );

        self.status = status;
        self
    }

    /// Adds a header; a later call with the same name replaces the value.
    ///
    /// `Content-Length` and the CORS headers are always computed by the
    /// builder and cannot be overridden here.
    ///
    /// # Panics
    /// Error message: `Must be called before any finalizing method`
    #[inline]
    #[track_caller]
    pub fn header<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) -> &mut Self {
        debug_assert!(
            self.state == ResponseState::Building,
            "Must be called before any finalizing method"
        );

        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets the raw response body and finalizes the response.
    #[inline]
    #[track_caller]
    pub fn body<T: AsRef<[u8]>>(&mut self, data: T) -> Handled {
        debug_assert!(
            self.state == ResponseState::Building,
            "Must be called before any finalizing method"
        );

        self.body.clear();
        self.body.extend_from_slice(data.as_ref());
        self.complete()
    }

    /// Finalizes the response without a body.
    #[inline]
    #[track_caller]
    pub fn empty(&mut self) -> Handled {
        self.body(b"")
    }

    /// Serializes `value` as the JSON body and finalizes the response.
    ///
    /// A value that fails to serialize turns the response into
    /// `500 Internal Server Error`.
    #[track_caller]
    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> Handled {
        match serde_json::to_vec(value) {
            Ok(body) => self.body(body),
            Err(err) => {
                log::warn!("Failed to serialize response body: {err}");
                self.status(StatusCode::InternalServerError)
                    .body(SERIALIZE_FAILED)
            }
        }
    }

    /// Writes an API error: its status code and JSON body.
    #[track_caller]
    pub fn error(&mut self, error: &ApiError) -> Handled {
        self.status(error.status()).json(&error.body())
    }

    #[inline(always)]
    fn complete(&mut self) -> Handled {
        self.state = ResponseState::Complete;
        Handled(())
    }
}

// Serialization
impl Response {
    /// Serializes the status line, headers and body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(256 + self.body.len());
        self.write_into(&mut buffer);
        buffer
    }

    pub(crate) fn write_into(&self, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(self.status.to_first_line());

        for (name, value) in self.headers.iter() {
            if Self::is_computed(name) {
                continue;
            }
            Self::write_header(buffer, name, value);
        }

        // Writing into a Vec cannot fail
        let _ = write!(buffer, "Content-Length: {}\r\n", self.body.len());
        if self.headers.get("content-type").is_none() {
            Self::write_header(buffer, "Content-Type", DEFAULT_CONTENT_TYPE);
        }
        for (name, value) in CORS_HEADERS {
            Self::write_header(buffer, name, value);
        }

        buffer.extend_from_slice(b"\r\n");
        buffer.extend_from_slice(&self.body);
    }

    #[inline(always)]
    fn write_header(buffer: &mut Vec<u8>, name: &str, value: &str) {
        buffer.extend_from_slice(name.as_bytes());
        buffer.extend_from_slice(b": ");
        buffer.extend_from_slice(value.as_bytes());
        buffer.extend_from_slice(b"\r\n");
    }

    #[inline]
    fn is_computed(name: &str) -> bool {
        name.eq_ignore_ascii_case("content-length")
            || CORS_HEADERS
                .iter()
                .any(|(cors, _)| name.eq_ignore_ascii_case(cors))
    }
}


#[cfg(test)]
mod header_tests {
    use super::*;
    use crate::tools::*;

    #[test]
    fn computed_headers() {
        let mut resp = Response::new();
        resp.body(r#"{"a":1}"#);

        assert_eq!(
            str_op(&resp.to_bytes()),
            "HTTP/1.1 200 OK\r\n\
             Content-Length: 7\r\n\
             Content-Type: application/json\r\n\
             Access-Control-Allow-Origin: *\r\n\
             Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
             Access-Control-Allow-Headers: Content-Type\r\n\
             \r\n\
             {\"a\":1}"
        );
    }

    #[test]
    fn handler_headers_come_first() {
        let mut resp = Response::new();
        resp.header("X-Custom", "1").header("Content-Type", "text/plain").body("hi");

        let text = str_op(&resp.to_bytes()).to_owned();
        let custom = text.find("x-custom: 1\r\n").unwrap();
        let length = text.find("Content-Length: 2\r\n").unwrap();

        assert!(custom < length);
        assert!(text.contains("content-type: text/plain\r\n"));
        assert!(!text.contains("application/json"));
    }

    #[test]
    fn computed_headers_cannot_be_overridden() {
        let mut resp = Response::new();
        resp.header("content-length", "999")
            .header("access-control-allow-origin", "https://example.com")
            .body("abc");

        let text = str_op(&resp.to_bytes()).to_owned();
        assert!(!text.contains("999"));
        assert!(!text.contains("example.com"));
        assert!(text.contains("Content-Length: 3\r\n"));
        assert_eq!(text.matches("Access-Control-Allow-Origin").count(), 1);
    }

    #[test]
    #[should_panic(expected = "Must be called before any finalizing method")]
    fn header_after_body() {
        let mut resp = Response::new();
        resp.body("");
        resp.header("Name", "value");
    }
}
