//! Maps a request's method and path onto an API endpoint.

use crate::{errors::ApiError, http::types::percent_decode, Method};

/// Endpoint selected for a request, with its decoded path parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `OPTIONS` on any path.
    Preflight,
    /// `GET /api/status`
    Status,
    /// `GET /api/player/{group}`
    Player { group: String },
    /// `GET /api/control/{group}/{item}`
    GetControl { group: String, item: String },
    /// `POST /api/control/{group}/{item}`
    SetControl { group: String, item: String },
}

/// Resolves a request target.
///
/// `OPTIONS` always wins, then the path must start with `api` and name an
/// endpoint. A query string is only stripped from the last path segment.
///
/// # Examples
/// ```
/// use control_rest::{route, Method, Route};
///
/// assert_eq!(
///     route(Some(Method::Get), "/api/control/Channel1/volume"),
///     Ok(Route::GetControl { group: "[Channel1]".into(), item: "volume".into() }),
/// );
/// assert_eq!(route(Some(Method::Options), "/anything"), Ok(Route::Preflight));
/// ```
pub fn route(method: Option<Method>, path: &str) -> Result<Route, ApiError> {
    if method == Some(Method::Options) {
        return Ok(Route::Preflight);
    }

    let segments = path_segments(path);

    if segments.first() != Some(&"api") {
        return Err(ApiError::NotApi);
    }
    let [_, endpoint, params @ ..] = segments.as_slice() else {
        return Err(ApiError::BadRequest);
    };

    match (*endpoint, params, method) {
        ("status", _, Some(Method::Get)) => Ok(Route::Status),
        ("player", [group, ..], Some(Method::Get)) => Ok(Route::Player {
            group: group_param(group),
        }),
        ("control", [group, item, ..], method) => {
            let group = group_param(group);
            let item = percent_decode(item);

            match method {
                Some(Method::Get) => Ok(Route::GetControl { group, item }),
                Some(Method::Post) => Ok(Route::SetControl { group, item }),
                _ => Err(ApiError::MethodNotAllowed),
            }
        }
        _ => Err(ApiError::EndpointNotFound),
    }
}

/// Splits a path on `/`, dropping empty segments and the query string of
/// the last segment.
fn path_segments(path: &str) -> Vec<&str> {
    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if let Some(last) = segments.last_mut() {
        if let Some(query) = last.find('?') {
            *last = &last[..query];
        }
    }

    segments
}

#[inline]
fn group_param(segment: &str) -> String {
    normalize_group(&percent_decode(segment))
}

/// Wraps a group name in square brackets unless it already starts with `[`.
///
/// ```
/// use control_rest::normalize_group;
///
/// assert_eq!(normalize_group("Channel1"), "[Channel1]");
/// assert_eq!(normalize_group("[Channel1]"), "[Channel1]");
/// ```
pub fn normalize_group(group: &str) -> String {
    if group.starts_with('[') {
        group.to_owned()
    } else {
        format!("[{group}]")
    }
}
