use crate::StatusCode;
use serde::Serialize;
use std::io;

/// Errors reported to HTTP clients.
///
/// Every variant maps to one status code and renders as a JSON object with
/// at least an `error` field, echoing the offending `group`/`item` where
/// there is one.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    /// The path does not start with `/api`.
    #[error("Not Found")]
    NotApi,
    /// `/api` without an endpoint segment.
    #[error("Bad Request")]
    BadRequest,
    #[error("Endpoint not found")]
    EndpointNotFound,
    #[error("Method Not Allowed")]
    MethodNotAllowed,

    #[error("Player not found")]
    PlayerNotFound { group: String },
    #[error("Control not found")]
    ControlNotFound { group: String, item: String },

    #[error("Invalid JSON body. Expected {{\"value\": <number>}}")]
    InvalidJson,
    #[error("Missing 'value' field in request body")]
    MissingValue,
    #[error("'value' field must be a number")]
    InvalidValue,

    /// The request did not fit in the connection's read limit.
    #[error("Request too large")]
    RequestTooLarge,
}

macro_rules! api_errors {
    ($($name:ident: $status:ident;)*) => {
        /// Status code sent with this error.
        pub const fn status(&self) -> StatusCode {
            match self { $(
                Self::$name { .. } => StatusCode::$status,
            )* }
        }
    };
}

impl ApiError {
    api_errors! {
        NotApi: NotFound;
        BadRequest: BadRequest;
        EndpointNotFound: NotFound;
        MethodNotAllowed: MethodNotAllowed;

        PlayerNotFound: NotFound;
        ControlNotFound: NotFound;

        InvalidJson: BadRequest;
        MissingValue: BadRequest;
        InvalidValue: BadRequest;

        RequestTooLarge: PayloadTooLarge;
    }

    /// JSON body sent with this error.
    pub fn body(&self) -> ErrorBody<'_> {
        let mut body = ErrorBody {
            error: self.to_string(),
            message: None,
            group: None,
            item: None,
        };

        match self {
            Self::NotApi => body.message = Some("API endpoints are under /api"),
            Self::PlayerNotFound { group } => body.group = Some(group),
            Self::ControlNotFound { group, item } => {
                body.group = Some(group);
                body.item = Some(item);
            }
            _ => {}
        }

        body
    }
}

/// Serialized form of an [`ApiError`].
#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<&'a str>,
}

/// Errors returned when starting the listener.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("server already running on port {0}")]
    AlreadyRunning(u16),

    #[error("failed to listen on 127.0.0.1:{port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(err: &ApiError) -> String {
        serde_json::to_string(&err.body()).unwrap()
    }

    #[test]
    fn status_codes() {
        #[rustfmt::skip]
        let cases = [
            (ApiError::NotApi,           404),
            (ApiError::BadRequest,       400),
            (ApiError::EndpointNotFound, 404),
            (ApiError::MethodNotAllowed, 405),
            (ApiError::PlayerNotFound { group: "[X]".into() }, 404),
            (ApiError::ControlNotFound { group: "[X]".into(), item: "y".into() }, 404),
            (ApiError::InvalidJson,      400),
            (ApiError::MissingValue,     400),
            (ApiError::InvalidValue,     400),
            (ApiError::RequestTooLarge,  413),
        ];

        for (err, code) in cases {
            assert_eq!(err.status().as_u16(), code, "{err:?}");
        }
    }

    #[test]
    fn bodies() {
        #[rustfmt::skip]
        let cases = [
            (ApiError::NotApi, r#"{"error":"Not Found","message":"API endpoints are under /api"}"#),
            (ApiError::BadRequest, r#"{"error":"Bad Request"}"#),
            (ApiError::EndpointNotFound, r#"{"error":"Endpoint not found"}"#),
            (ApiError::MethodNotAllowed, r#"{"error":"Method Not Allowed"}"#),
            (
                ApiError::PlayerNotFound { group: "[nonexistent-group]".into() },
                r#"{"error":"Player not found","group":"[nonexistent-group]"}"#,
            ),
            (
                ApiError::ControlNotFound { group: "[Channel1]".into(), item: "volume".into() },
                r#"{"error":"Control not found","group":"[Channel1]","item":"volume"}"#,
            ),
            (
                ApiError::InvalidJson,
                r#"{"error":"Invalid JSON body. Expected {\"value\": <number>}"}"#,
            ),
            (ApiError::MissingValue, r#"{"error":"Missing 'value' field in request body"}"#),
        ];

        for (err, expected) in cases {
            assert_eq!(render(&err), expected);
        }
    }

    #[test]
    fn server_error_display() {
        let err = ServerError::Bind {
            port: 8080,
            source: io::Error::new(io::ErrorKind::AddrInUse, "address in use"),
        };

        assert_eq!(
            err.to_string(),
            "failed to listen on 127.0.0.1:8080: address in use"
        );
        assert_eq!(
            ServerError::AlreadyRunning(8080).to_string(),
            "server already running on port 8080"
        );
    }
}
