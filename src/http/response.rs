//! Error responses.
//!
//! # Status Mapping
//! ```text
//! Validation  → 400
//! BreakerOpen → 503
//! Transport   → 502
//! Remote      → 502
//! Timeout     → 504
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::client::types::GatewayError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

/// A [`GatewayError`] on its way out of an HTTP handler.
#[derive(Debug)]
pub struct ApiError(pub GatewayError);

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        Self(err)
    }
}

pub fn status_for(err: &GatewayError) -> StatusCode {
    match err {
        GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
        GatewayError::BreakerOpen { .. } => StatusCode::SERVICE_UNAVAILABLE,
        GatewayError::Transport { .. } | GatewayError::Remote { .. } => StatusCode::BAD_GATEWAY,
        GatewayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.0.kind().to_string(),
            message: self.0.to_string(),
        };
        (status_for(&self.0), Json(body)).into_response()
    }
}
