//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the chat, tool and health handlers
//! - Wire up middleware (request ID, tracing, timeout, concurrency limit)
//! - Serve on a listener until shutdown is signalled

use axum::{
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::client::types::{GatewayError, OperationRequest, PartitionKey};
use crate::gateway::{ChatReply, ChatRequest, Gateway};
use crate::health::Liveness;
use crate::http::request::{request_id, MakeRequestUuid};
use crate::http::response::ApiError;

/// Headroom past the core deadline so the core reports the timeout, not the layer.
const LAYER_TIMEOUT_GRACE: Duration = Duration::from_secs(5);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Gateway,
}

/// A tool invocation from an out-of-process engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub tenant_id: String,
    pub service: String,
    pub operation: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl ToolCall {
    fn into_parts(self) -> Result<(PartitionKey, OperationRequest), ApiError> {
        if self.tenant_id.trim().is_empty() {
            return Err(GatewayError::Validation("tenant_id is required".into()).into());
        }
        let request = OperationRequest {
            service: self.service,
            operation: self.operation,
            fields: self.fields,
        };
        Ok((PartitionKey::from(self.tenant_id), request))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub result: Value,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(gateway: Gateway) -> Self {
        let router = Self::build_router(gateway);
        Self { router }
    }

    /// Router with every layer applied, for serving or in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(gateway: Gateway) -> Router {
        let timeout = gateway.request_deadline() + LAYER_TIMEOUT_GRACE;
        let max_connections = gateway.config().listener.max_connections.max(1);
        let state = AppState { gateway };

        Router::new()
            .route("/v1/chat", post(chat_handler))
            .route("/v1/tools/read", post(tool_read_handler))
            .route("/v1/tools/write", post(tool_write_handler))
            .route("/health", get(health_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(timeout))
            .layer(ConcurrencyLimitLayer::new(max_connections))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn chat_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    let request_id = request_id(&headers);
    tracing::debug!(
        request_id = %request_id,
        tenant = %request.tenant_id,
        session = %request.session_id,
        "Chat message received"
    );
    let reply = state.gateway.handle_message(request).await?;
    Ok(Json(reply))
}

async fn tool_read_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(call): Json<ToolCall>,
) -> Result<Json<ToolResult>, ApiError> {
    let (tenant, request) = call.into_parts()?;
    tracing::debug!(
        request_id = %request_id(&headers),
        tenant = %tenant,
        operation = %request.operation,
        "Tool read"
    );
    let result = state.gateway.tool_read(&tenant, request).await?;
    Ok(Json(ToolResult { result }))
}

async fn tool_write_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(call): Json<ToolCall>,
) -> Result<Json<ToolResult>, ApiError> {
    let (tenant, request) = call.into_parts()?;
    tracing::debug!(
        request_id = %request_id(&headers),
        tenant = %tenant,
        operation = %request.operation,
        "Tool write"
    );
    let result = state.gateway.tool_write(&tenant, request).await?;
    Ok(Json(ToolResult { result }))
}

async fn health_handler(State(state): State<AppState>) -> Json<Liveness> {
    Json(state.gateway.liveness())
}
