//! Request/response types and the error taxonomy shared by every outbound path.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Identifier scoping breaker and cache state.
///
/// Usually a tenant id; shared-infrastructure endpoints use [`PartitionKey::global`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey(Arc<str>);

impl PartitionKey {
    pub const GLOBAL: &'static str = "global";

    pub fn new(key: impl AsRef<str>) -> Self {
        Self(Arc::from(key.as_ref()))
    }

    /// Partition for endpoints not owned by any single tenant.
    pub fn global() -> Self {
        Self::new(Self::GLOBAL)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PartitionKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for PartitionKey {
    fn from(key: String) -> Self {
        Self(Arc::from(key))
    }
}

/// A request to a downstream service.
///
/// The wire body is a flat JSON object: the operation code under the
/// configured discriminant field, plus `fields`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRequest {
    /// Configured service name (resolved to a URL by the shared client).
    pub service: String,
    /// Operation code carried in the body.
    pub operation: String,
    /// Remaining body fields, opaque to the gateway.
    #[serde(default)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl OperationRequest {
    pub fn new(service: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            operation: operation.into(),
            fields: serde_json::Map::new(),
        }
    }

    /// Add a body field.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Build the JSON body with the operation code under `operation_field`.
    pub fn to_body(&self, operation_field: &str) -> serde_json::Value {
        let mut body = self.fields.clone();
        body.insert(
            operation_field.to_string(),
            serde_json::Value::String(self.operation.clone()),
        );
        serde_json::Value::Object(body)
    }
}

/// Any response received from the wire, whatever its status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl RemoteResponse {
    /// True for 2xx responses whose body carries `"success": true`.
    ///
    /// Downstream services always state the outcome; a body without the flag
    /// is not trusted as a success.
    pub fn is_success(&self) -> bool {
        self.is_ok_status() && self.body.get("success").and_then(|v| v.as_bool()) == Some(true)
    }

    pub fn is_ok_status(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Interpret a downstream service response, turning error statuses and
    /// bodies without `"success": true` into [`GatewayError::Remote`].
    pub fn into_result(self, operation: &str) -> GatewayResult<serde_json::Value> {
        if self.is_success() {
            return Ok(self.body);
        }
        Err(self.into_remote_error(operation))
    }

    /// Like [`RemoteResponse::into_result`] but only the status is checked.
    pub fn into_body(self, operation: &str) -> GatewayResult<serde_json::Value> {
        if self.is_ok_status() {
            return Ok(self.body);
        }
        Err(self.into_remote_error(operation))
    }

    fn into_remote_error(self, operation: &str) -> GatewayError {
        let message = self
            .body
            .get("message")
            .or_else(|| self.body.get("error"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("status {}", self.status));
        GatewayError::Remote {
            operation: operation.to_string(),
            status: self.status,
            message,
        }
    }
}

/// Network-level failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    Timeout,
    Connect,
    Other,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Timeout => f.write_str("timeout"),
            TransportKind::Connect => f.write_str("connect"),
            TransportKind::Other => f.write_str("other"),
        }
    }
}

/// Errors surfaced by the gateway core.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Connectivity failure or per-call timeout. Retryable; drives breakers.
    #[error("transport error ({kind}) calling {operation}: {message}")]
    Transport {
        operation: String,
        kind: TransportKind,
        message: String,
    },

    /// Well-formed error response from downstream.
    #[error("remote error from {operation} (status {status}): {message}")]
    Remote {
        operation: String,
        status: u16,
        message: String,
    },

    /// Fast-fail: the breaker for this partition is open.
    #[error("circuit breaker '{breaker}' open for partition {partition}")]
    BreakerOpen { breaker: String, partition: String },

    /// Malformed input rejected before any call.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The overall request deadline elapsed.
    #[error("deadline of {0:?} exceeded")]
    Timeout(Duration),
}

impl GatewayError {
    /// Classify a reqwest failure. Only called for errors raised before or
    /// while reading a response, so every one of them is a transport failure.
    pub fn from_reqwest(operation: &str, err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportKind::Timeout
        } else if err.is_connect() {
            TransportKind::Connect
        } else {
            TransportKind::Other
        };
        GatewayError::Transport {
            operation: operation.to_string(),
            kind,
            message: err.to_string(),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, GatewayError::Transport { .. })
    }

    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Transport { .. } => "transport",
            GatewayError::Remote { .. } => "remote",
            GatewayError::BreakerOpen { .. } => "breaker_open",
            GatewayError::Validation(_) => "validation",
            GatewayError::Timeout(_) => "timeout",
        }
    }
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
