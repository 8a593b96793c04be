//! Request preparation.
//!
//! # Responsibilities
//! - Read the request ID assigned by the request-id layer
//! - Strip the mount prefix from the request path
//! - Percent-decode the remainder before routing
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Routing sees decoded paths, so captures carry decoded values

use std::borrow::Cow;

use axum::http::HeaderMap;
use percent_encoding::percent_decode_str;

pub const X_REQUEST_ID: &str = "x-request-id";

/// The request ID header value, or "unknown".
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Path relative to `mount`, or `None` if the request is outside it.
pub fn strip_mount<'a>(mount: &str, path: &'a str) -> Option<&'a str> {
    if mount.is_empty() {
        return Some(path);
    }
    path.strip_prefix(mount).filter(|rest| rest.starts_with('/'))
}

/// Percent-decode a path. Invalid UTF-8 after decoding yields `None`.
pub fn decode_path(path: &str) -> Option<Cow<'_, str>> {
    percent_decode_str(path).decode_utf8().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_strip_mount() {
        assert_eq!(strip_mount("/inventory", "/inventory/"), Some("/"));
        assert_eq!(strip_mount("/inventory", "/inventory/groups/"), Some("/groups/"));
        assert_eq!(strip_mount("/inventory", "/inventory"), None);
        assert_eq!(strip_mount("/inventory", "/inventoryx/"), None);
        assert_eq!(strip_mount("/inventory", "/groups/"), None);
        assert_eq!(strip_mount("", "/groups/"), Some("/groups/"));
    }

    #[test]
    fn test_decode_path() {
        assert_eq!(
            decode_path("/probes/some%20probe%20name/").unwrap(),
            "/probes/some probe name/"
        );
        assert_eq!(decode_path("/machine/ABC/").unwrap(), "/machine/ABC/");
        assert!(decode_path("/machine/%FF/").is_none());
    }

    #[test]
    fn test_request_id() {
        let mut headers = HeaderMap::new();
        assert_eq!(request_id(&headers), "unknown");
        headers.insert(X_REQUEST_ID, HeaderValue::from_static("abc"));
        assert_eq!(request_id(&headers), "abc");
    }
}
