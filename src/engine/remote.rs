//! HTTP-backed reasoning engine.

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::json;
use url::Url;

use crate::agents::TenantContext;
use crate::client::shared::SharedClient;
use crate::client::types::{GatewayError, GatewayResult};
use crate::engine::{ReasoningEngine, Toolbox};

const OPERATION: &str = "engine_turn";

/// Forwards each turn to an engine service.
///
/// A turn mutates conversation state on the engine side, so it is sent
/// exactly once and never retried.
#[derive(Debug, Clone)]
pub struct RemoteEngine {
    client: SharedClient,
    url: Url,
}

impl RemoteEngine {
    pub fn new(client: SharedClient, url: Url) -> Self {
        Self { client, url }
    }

    async fn turn(
        &self,
        message: &str,
        session_id: &str,
        context: &TenantContext,
    ) -> GatewayResult<String> {
        let body = json!({
            "message": message,
            "session_id": session_id,
            "tenant_id": context.tenant_id,
            "context": context.sections,
            "degraded": context.degraded,
        });

        let response = self
            .client
            .post_json(OPERATION, self.url.clone(), &body)
            .await?;
        let status = response.status;
        let body = response.into_body(OPERATION)?;

        body.get("reply")
            .and_then(|reply| reply.as_str())
            .map(str::to_string)
            .ok_or_else(|| GatewayError::Remote {
                operation: OPERATION.to_string(),
                status,
                message: "engine response has no 'reply' field".to_string(),
            })
    }
}

impl ReasoningEngine for RemoteEngine {
    fn handle<'a>(
        &'a self,
        message: &'a str,
        session_id: &'a str,
        context: &'a TenantContext,
        _toolbox: &'a Toolbox,
    ) -> BoxFuture<'a, GatewayResult<String>> {
        self.turn(message, session_id, context).boxed()
    }
}
