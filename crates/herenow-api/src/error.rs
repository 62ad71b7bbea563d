//! API error types and JSON error response formatting.
//!
//! The response bodies here are part of the wire contract consumed by
//! the widget script, so each variant maps to a fixed JSON shape rather
//! than a generic code/message envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - a required parameter is missing or empty.
    MissingParameter(&'static str),
    /// 403 Forbidden - the requested domain is not allowlisted.
    DomainNotAllowed,
    /// 500 Internal Server Error - the event insert failed.
    TrackFailed,
    /// 500 Internal Server Error - the presence aggregation failed.
    /// Carries diagnostic detail plus the query key.
    StatsFailed {
        details: String,
        domain: String,
        path: String,
    },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::MissingParameter(name) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": format!("Missing required parameter: {}", name) }),
            ),
            ApiError::DomainNotAllowed => (
                StatusCode::FORBIDDEN,
                json!({ "error": "Domain not allowed" }),
            ),
            ApiError::TrackFailed => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Failed to track event" }),
            ),
            ApiError::StatsFailed {
                details,
                domain,
                path,
            } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error": "Failed to get stats",
                    "details": details,
                    "domain": domain,
                    "path": path,
                }),
            ),
        };

        (status, Json(body)).into_response()
    }
}
