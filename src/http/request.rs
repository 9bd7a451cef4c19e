//! Request identification.
//!
//! # Responsibilities
//! - Generate a UUID request ID when the caller sent none (`MakeRequestUuid`)
//! - Read the ID back in handlers for log correlation
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - An incoming `x-request-id` is kept, never overwritten

use axum::http::HeaderMap;

pub use tower_http::request_id::MakeRequestUuid;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Request ID of an inbound request, or "unknown".
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}
