//! Response mapping.
//!
//! # Responsibilities
//! - Map routing and view errors to HTTP status codes
//! - Render error bodies as JSON
//!
//! # Design Decisions
//! - Routing NotFound is the only 404 source; it is never recovered locally
//! - Internal details stay in the logs, not in 500 bodies

use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::routing::RoutingError;
use crate::views::ViewError;

pub fn not_found(path: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "not_found", "path": path })),
    )
        .into_response()
}

fn error(status: StatusCode, code: &str, detail: impl Into<String>) -> Response {
    (status, Json(json!({ "error": code, "detail": detail.into() }))).into_response()
}

impl IntoResponse for RoutingError {
    fn into_response(self) -> Response {
        match self {
            RoutingError::NotFound { path } => not_found(&path),
            other => {
                tracing::error!(error = %other, "Routing failure");
                error(StatusCode::INTERNAL_SERVER_ERROR, "internal", "routing failure")
            }
        }
    }
}

impl IntoResponse for ViewError {
    fn into_response(self) -> Response {
        match self {
            ViewError::BadCapture(e) => {
                error(StatusCode::BAD_REQUEST, "bad_request", e.to_string())
            }
            ViewError::MethodNotAllowed { method, allowed } => {
                let mut response = error(
                    StatusCode::METHOD_NOT_ALLOWED,
                    "method_not_allowed",
                    format!("{method} not allowed"),
                );
                let allow = allowed
                    .iter()
                    .map(Method::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                if let Ok(value) = HeaderValue::from_str(&allow) {
                    response.headers_mut().insert(header::ALLOW, value);
                }
                response
            }
            ViewError::Internal(detail) => {
                tracing::error!(detail = %detail, "View failure");
                error(StatusCode::INTERNAL_SERVER_ERROR, "internal", "view failure")
            }
        }
    }
}
