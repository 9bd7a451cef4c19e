//! Process-wide gateway core.
//!
//! # Responsibilities
//! - Own every registry (breakers, caches, agents, session locks) and the shared client
//! - Expose the read path, the write bypass and inbound message handling
//!
//! # Data Flow
//! ```text
//! handle_message(request)
//!     → validate
//!     → deadline {
//!           get_or_build_agent(tenant) → parallel fetch_resource reads
//!           with_session(session) → engine.handle(...)
//!       }
//! ```
//!
//! # Design Decisions
//! - Registries are built explicitly in `Gateway::new`; tests build isolated instances
//! - One named breaker per downstream service, partitioned by tenant
//! - Writes never touch a breaker, a cache or the retry loop

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use url::Url;

use crate::agents::{self, AgentHandle, AgentHandleCache, TenantContext};
use crate::cache::CacheRegistry;
use crate::client::shared::SharedClient;
use crate::client::types::{GatewayError, GatewayResult, OperationRequest, PartitionKey, RemoteResponse};
use crate::config::{GatewayConfig, ResourceConfig, ServiceConfig};
use crate::engine::toolbox::read_cache_key;
use crate::engine::{ReasoningEngine, RemoteEngine, Toolbox};
use crate::health::Liveness;
use crate::observability::metrics;
use crate::resilience::{with_deadline, BreakerRegistry, ResilientCall, RetryingInvoker};
use crate::sessions::SessionSerializer;

/// Failures while wiring the gateway at startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to build shared client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("invalid engine URL: {0}")]
    EngineUrl(#[from] url::ParseError),
}

/// One inbound message.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: String,
    pub tenant_id: String,
}

impl ChatRequest {
    pub fn validate(&self) -> GatewayResult<()> {
        if self.message.trim().is_empty() {
            return Err(GatewayError::Validation("message must not be blank".into()));
        }
        if self.tenant_id.trim().is_empty() {
            return Err(GatewayError::Validation("tenant_id is required".into()));
        }
        if self.session_id.trim().is_empty() {
            return Err(GatewayError::Validation("session_id is required".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatReply {
    pub reply: String,
    pub session_id: String,
    /// Context resources that were served from defaults for this turn.
    #[serde(default)]
    pub degraded: Vec<String>,
}

struct GatewayInner {
    config: GatewayConfig,
    client: SharedClient,
    breakers: BreakerRegistry,
    invoker: RetryingInvoker,
    caches: CacheRegistry<Value>,
    agents: AgentHandleCache<TenantContext>,
    sessions: SessionSerializer,
    engine: Arc<dyn ReasoningEngine>,
    started_at: Instant,
}

/// Cheap to clone; all clones share the same registries.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

impl Gateway {
    /// Wire the gateway with a [`RemoteEngine`] at `engine.url`.
    pub fn new(config: GatewayConfig) -> Result<Self, StartupError> {
        let client = SharedClient::new(&config.client, &config.services)?;
        let engine_url = Url::parse(&config.engine.url)?;
        let engine = Arc::new(RemoteEngine::new(client.clone(), engine_url));
        Ok(Self::assemble(config, client, engine))
    }

    /// Wire the gateway around a caller-supplied engine.
    pub fn with_engine(
        config: GatewayConfig,
        engine: Arc<dyn ReasoningEngine>,
    ) -> Result<Self, StartupError> {
        let client = SharedClient::new(&config.client, &config.services)?;
        Ok(Self::assemble(config, client, engine))
    }

    fn assemble(config: GatewayConfig, client: SharedClient, engine: Arc<dyn ReasoningEngine>) -> Self {
        let caches = CacheRegistry::new(config.tools.max_entries);
        for resource in &config.resources {
            caches.register(&resource.name, resource.max_entries);
        }

        tracing::info!(
            services = config.services.len(),
            resources = config.resources.len(),
            breaker_threshold = config.breaker.failure_threshold,
            breaker_reset_secs = config.breaker.reset_ttl_secs,
            retry_attempts = config.retries.max_attempts,
            "Gateway core initialized"
        );

        let inner = GatewayInner {
            breakers: BreakerRegistry::new(config.breaker.clone()),
            invoker: RetryingInvoker::from_config(&config.retries),
            agents: AgentHandleCache::new(config.agents.ttl(), config.agents.max_size),
            sessions: SessionSerializer::new(config.sessions.high_water_mark),
            caches,
            client,
            engine,
            config,
            started_at: Instant::now(),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }

    pub fn client(&self) -> &SharedClient {
        &self.inner.client
    }

    pub fn breakers(&self) -> &BreakerRegistry {
        &self.inner.breakers
    }

    pub fn caches(&self) -> &CacheRegistry<Value> {
        &self.inner.caches
    }

    pub fn agents(&self) -> &AgentHandleCache<TenantContext> {
        &self.inner.agents
    }

    pub fn sessions(&self) -> &SessionSerializer {
        &self.inner.sessions
    }

    pub fn uptime(&self) -> Duration {
        self.inner.started_at.elapsed()
    }

    /// Swap the downstream endpoint table.
    pub fn update_services(&self, services: &[ServiceConfig]) {
        self.inner.client.update_services(services);
    }

    /// Breaker-guarded, retrying call under `service`'s breaker.
    pub async fn resilient_call<T, F, Fut>(
        &self,
        service: &str,
        operation_key: &str,
        partition: &PartitionKey,
        factory: F,
    ) -> GatewayResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = GatewayResult<T>>,
    {
        ResilientCall::new(self.inner.breakers.get(service), self.inner.invoker.clone())
            .call(operation_key, partition, factory)
            .await
    }

    /// Read-through fetch in the `resource_type` namespace.
    pub async fn cached_fetch<F, Fut>(
        &self,
        resource_type: &str,
        key: &str,
        ttl: Duration,
        fetch: F,
    ) -> GatewayResult<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = GatewayResult<Value>>,
    {
        self.inner.caches.cached_fetch(resource_type, key, ttl, fetch).await
    }

    /// Reject requests for services missing from the endpoint table.
    ///
    /// Runs before any breaker or cache is looked up, so unknown names never
    /// create registry entries.
    fn ensure_known_service(&self, service: &str) -> GatewayResult<()> {
        if self.inner.client.directory().get(service).is_none() {
            return Err(GatewayError::Validation(format!("unknown service '{}'", service)));
        }
        Ok(())
    }

    /// One idempotent downstream read: breaker, retry, then response interpretation.
    async fn read(&self, partition: &PartitionKey, request: &OperationRequest) -> GatewayResult<Value> {
        self.ensure_known_service(&request.service)?;
        let client = &self.inner.client;
        self.resilient_call(&request.service, &request.operation, partition, || async move {
            client.send(request).await?.into_result(&request.operation)
        })
        .await
    }

    /// Fetch one context resource for `tenant_id` through its cache.
    pub async fn fetch_resource(&self, tenant_id: &str, resource: &ResourceConfig) -> GatewayResult<Value> {
        self.ensure_known_service(&resource.service)?;
        let partition = PartitionKey::from(tenant_id);
        let request = OperationRequest::new(&resource.service, &resource.operation)
            .field(resource.tenant_field.as_str(), tenant_id);

        let (partition, request) = (&partition, &request);
        self.cached_fetch(&resource.name, tenant_id, resource.ttl(), || async move {
            let body = self.read(partition, request).await?;
            Ok(agents::context::extract_section(resource, body))
        })
        .await
    }

    /// Cached agent for `tenant_id`, built from its context on first use.
    ///
    /// An agent built with fallback sections only lives `agents.degraded_ttl`,
    /// so a recovered downstream is picked up without waiting a full TTL.
    pub async fn get_or_build_agent(&self, tenant_id: &str) -> GatewayResult<AgentHandle<TenantContext>> {
        let settings = &self.inner.config.agents;
        let lifetime = |context: &TenantContext| {
            if context.is_degraded() {
                settings.degraded_ttl()
            } else {
                settings.ttl()
            }
        };
        self.inner
            .agents
            .get_or_build_with(tenant_id, lifetime, || async move {
                let resources = &self.inner.config.resources;
                let context = agents::assemble(tenant_id, resources, |resource| {
                    self.fetch_resource(tenant_id, resource)
                })
                .await;
                Ok(context)
            })
            .await
    }

    /// Run `f` with the session's lock held.
    pub async fn with_session<F, Fut, T>(&self, session_id: &str, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.inner.sessions.with_session(session_id, f).await
    }

    /// Non-idempotent call: exactly one network attempt, no breaker, no cache.
    pub async fn submit_write(&self, request: &OperationRequest) -> GatewayResult<RemoteResponse> {
        let result = self.inner.client.send(request).await;
        let outcome = match &result {
            Ok(response) if response.is_success() => "ok",
            Ok(_) => "remote_error",
            Err(e) => e.kind(),
        };
        metrics::record_write_call(&request.operation, outcome);
        match &result {
            Ok(response) => tracing::info!(
                service = %request.service,
                operation = %request.operation,
                status = response.status,
                outcome,
                "Write submitted"
            ),
            Err(e) => tracing::warn!(
                service = %request.service,
                operation = %request.operation,
                error = %e,
                "Write failed"
            ),
        }
        result
    }

    /// Tool read on behalf of `tenant`, cached per service.
    pub async fn tool_read(&self, tenant: &PartitionKey, request: OperationRequest) -> GatewayResult<Value> {
        self.ensure_known_service(&request.service)?;
        let namespace = tool_namespace(&request.service);
        let key = read_cache_key(&request.operation, tenant, &request.fields);
        let ttl = Duration::from_secs(self.inner.config.tools.read_ttl_secs);
        let request = &request;
        self.cached_fetch(&namespace, &key, ttl, || async move { self.read(tenant, request).await })
            .await
    }

    /// Tool write on behalf of `tenant`.
    pub async fn tool_write(&self, tenant: &PartitionKey, request: OperationRequest) -> GatewayResult<Value> {
        tracing::debug!(tenant = %tenant, operation = %request.operation, "Tool write");
        self.submit_write(&request).await?.into_result(&request.operation)
    }

    /// Process one inbound message under the overall deadline.
    pub async fn handle_message(&self, request: ChatRequest) -> GatewayResult<ChatReply> {
        let start = Instant::now();
        let result = match request.validate() {
            Ok(()) => with_deadline(self.request_deadline(), self.process(&request)).await,
            Err(e) => Err(e),
        };

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        metrics::record_chat_request(outcome, start);
        if let Err(e) = &result {
            tracing::warn!(
                tenant = %request.tenant_id,
                session = %request.session_id,
                error = %e,
                "Message handling failed"
            );
        }
        result
    }

    async fn process(&self, request: &ChatRequest) -> GatewayResult<ChatReply> {
        let agent = self.get_or_build_agent(&request.tenant_id).await?;
        let context = agent.instance.as_ref();
        let toolbox = Toolbox::new(self.clone(), PartitionKey::from(request.tenant_id.as_str()));

        let reply = self
            .with_session(&request.session_id, || {
                self.inner
                    .engine
                    .handle(&request.message, &request.session_id, context, &toolbox)
            })
            .await?;

        tracing::debug!(
            tenant = %request.tenant_id,
            session = %request.session_id,
            reply_len = reply.len(),
            "Message handled"
        );
        Ok(ChatReply {
            reply,
            session_id: request.session_id.clone(),
            degraded: context.degraded.clone(),
        })
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_secs(self.inner.config.timeouts.request_secs)
    }

    pub fn liveness(&self) -> Liveness {
        Liveness::collect(&self.inner.breakers, self.inner.started_at)
    }
}

/// Cache namespace for tool reads against `service`.
///
/// One namespace per configured service keeps the number of caches bounded by
/// the endpoint table; operation codes live in the key.
pub fn tool_namespace(service: &str) -> String {
    format!("tools/{}", service)
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("client", &self.inner.client)
            .field("agents", &self.inner.agents.len())
            .field("sessions", &self.inner.sessions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::BoxFuture;
    use futures_util::FutureExt;

    struct EchoEngine;

    impl ReasoningEngine for EchoEngine {
        fn handle<'a>(
            &'a self,
            message: &'a str,
            _session_id: &'a str,
            context: &'a TenantContext,
            _toolbox: &'a Toolbox,
        ) -> BoxFuture<'a, GatewayResult<String>> {
            async move { Ok(format!("{}:{}", context.tenant_id, message)) }.boxed()
        }
    }

    fn gateway() -> Gateway {
        Gateway::with_engine(GatewayConfig::default(), Arc::new(EchoEngine)).unwrap()
    }

    fn chat(message: &str, session: &str, tenant: &str) -> ChatRequest {
        ChatRequest {
            message: message.into(),
            session_id: session.into(),
            tenant_id: tenant.into(),
        }
    }

    #[tokio::test]
    async fn test_validation_rejects_before_any_work() {
        let gw = gateway();
        for req in [chat("  ", "S", "T"), chat("hi", "", "T"), chat("hi", "S", "")] {
            let err = gw.handle_message(req).await.unwrap_err();
            assert_eq!(err.kind(), "validation");
        }
        assert!(gw.agents().is_empty());
    }

    #[tokio::test]
    async fn test_message_reaches_engine_with_tenant_context() {
        let gw = gateway();
        let reply = gw.handle_message(chat("hola", "S1", "T1")).await.unwrap();
        assert_eq!(reply.reply, "T1:hola");
        assert_eq!(reply.session_id, "S1");
        assert_eq!(gw.agents().len(), 1);
    }

    #[tokio::test]
    async fn test_write_to_unknown_service_is_validation() {
        let gw = gateway();
        let err = gw
            .submit_write(&OperationRequest::new("calendario", "CREAR_EVENTO"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert!(gw.breakers().snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_resource_degrades_to_default() {
        let mut config = GatewayConfig::default();
        config.services = vec![ServiceConfig {
            name: "informacion".into(),
            url: "http://127.0.0.1:1/ws_informacion_ia.php".into(),
        }];
        config.retries.max_attempts = 1;
        config.resources = vec![ResourceConfig {
            name: "contexto".into(),
            service: "informacion".into(),
            operation: "OBTENER_CONTEXTO_NEGOCIO".into(),
            tenant_field: "id_empresa".into(),
            response_field: Some("contexto_negocio".into()),
            ttl_secs: 3600,
            max_entries: 500,
            default: Value::String(String::new()),
        }];
        let gw = Gateway::with_engine(config, Arc::new(EchoEngine)).unwrap();

        let agent = gw.get_or_build_agent("T1").await.unwrap();
        assert_eq!(agent.instance.degraded, vec!["contexto".to_string()]);
        assert_eq!(agent.instance.section("contexto"), Some(&Value::String(String::new())));
        assert_eq!(gw.breakers().get("informacion").failures(&PartitionKey::from("T1")), 1);
    }
}
