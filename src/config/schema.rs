//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the agent gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Inbound listener (bind address, concurrency limit).
    pub listener: ListenerConfig,

    /// Admin API settings.
    pub admin: AdminConfig,

    /// Shared outbound client settings.
    pub client: ClientConfig,

    /// Retry configuration for idempotent reads.
    pub retries: RetryConfig,

    /// Circuit breaker settings.
    pub breaker: BreakerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Per-tenant agent handle cache.
    pub agents: AgentCacheConfig,

    /// Per-session serialization.
    pub sessions: SessionConfig,

    /// Engine tool routing.
    pub tools: ToolConfig,

    /// Reasoning engine endpoint.
    pub engine: EngineConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Downstream service endpoints.
    pub services: Vec<ServiceConfig>,

    /// Context resources fetched when building a tenant's agent.
    pub resources: Vec<ResourceConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrently handled requests (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 1_000,
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// Shared outbound client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Per-attempt request timeout in seconds.
    pub timeout_secs: u64,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Maximum idle pooled connections per host.
    pub pool_max_idle_per_host: usize,

    /// Idle pooled connection lifetime in seconds.
    pub pool_idle_timeout_secs: u64,

    /// Body field carrying the operation code.
    pub operation_field: String,

    /// User-Agent header for outbound calls.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            connect_timeout_secs: 5,
            pool_max_idle_per_host: 32,
            pool_idle_timeout_secs: 90,
            operation_field: "codOpe".to_string(),
            user_agent: concat!("agent-gateway/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum attempts per logical call (1 disables retry).
    pub max_attempts: u32,

    /// Minimum wait between attempts in milliseconds.
    pub wait_min_ms: u64,

    /// Maximum wait between attempts in milliseconds.
    pub wait_max_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            wait_min_ms: 1_000,
            wait_max_ms: 4_000,
        }
    }
}

impl RetryConfig {
    pub fn wait_min(&self) -> Duration {
        Duration::from_millis(self.wait_min_ms)
    }

    pub fn wait_max(&self) -> Duration {
        Duration::from_millis(self.wait_max_ms)
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive transport failures before opening.
    pub failure_threshold: u32,

    /// Seconds an open breaker rejects calls before letting traffic through.
    pub reset_ttl_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            reset_ttl_secs: 300,
        }
    }
}

impl BreakerConfig {
    pub fn reset_ttl(&self) -> Duration {
        Duration::from_secs(self.reset_ttl_secs)
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Overall deadline for one inbound request in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 120 }
    }
}

/// Agent handle cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AgentCacheConfig {
    /// Seconds before a built handle is rebuilt.
    pub ttl_secs: u64,

    /// Maximum cached handles.
    pub max_size: usize,

    /// Seconds a handle built from fallback context lives before a rebuild.
    pub degraded_ttl_secs: u64,
}

impl Default for AgentCacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3_600,
            max_size: 500,
            degraded_ttl_secs: 30,
        }
    }
}

impl AgentCacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn degraded_ttl(&self) -> Duration {
        Duration::from_secs(self.degraded_ttl_secs)
    }
}

/// Session serializer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Lock count above which idle session locks are swept.
    pub high_water_mark: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            high_water_mark: 1_000,
        }
    }
}

/// Engine tool routing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolConfig {
    /// TTL of cached tool reads in seconds.
    pub read_ttl_secs: u64,

    /// Maximum cached entries per tool read operation.
    pub max_entries: usize,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            read_ttl_secs: 300,
            max_entries: 500,
        }
    }
}

/// Reasoning engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Engine turn endpoint.
    pub url: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:9000/turn".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format ("pretty" or "json").
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// A named downstream service.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ServiceConfig {
    /// Service name referenced by resources and tool calls.
    pub name: String,

    /// Endpoint URL.
    pub url: String,
}

/// A context resource fetched per tenant while building its agent.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResourceConfig {
    /// Resource type name (also the cache namespace).
    pub name: String,

    /// Service to call.
    pub service: String,

    /// Operation code sent to the service.
    pub operation: String,

    /// Body field carrying the tenant id.
    #[serde(default = "default_tenant_field")]
    pub tenant_field: String,

    /// Response field holding the value; the whole body when absent.
    #[serde(default)]
    pub response_field: Option<String>,

    /// Cache TTL in seconds.
    #[serde(default = "default_resource_ttl")]
    pub ttl_secs: u64,

    /// Maximum cached tenants for this resource.
    #[serde(default = "default_resource_entries")]
    pub max_entries: usize,

    /// Value used when the fetch fails.
    #[serde(default)]
    pub default: serde_json::Value,
}

impl ResourceConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

fn default_tenant_field() -> String {
    "id_empresa".to_string()
}

fn default_resource_ttl() -> u64 {
    3_600
}

fn default_resource_entries() -> usize {
    500
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.breaker.failure_threshold, 3);
        assert_eq!(config.breaker.reset_ttl(), Duration::from_secs(300));
        assert_eq!(config.retries.max_attempts, 2);
        assert_eq!(config.agents.max_size, 500);
        assert_eq!(config.agents.degraded_ttl(), Duration::from_secs(30));
        assert_eq!(config.client.operation_field, "codOpe");
        assert!(config.services.is_empty());
    }

    #[test]
    fn test_minimal_toml() {
        let raw = r#"
            [breaker]
            failure_threshold = 5

            [[services]]
            name = "informacion"
            url = "http://localhost:7000/ws_informacion_ia.php"

            [[resources]]
            name = "business_context"
            service = "informacion"
            operation = "OBTENER_CONTEXTO_NEGOCIO"
            response_field = "contexto_negocio"
            default = ""
        "#;
        let config: GatewayConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.breaker.failure_threshold, 5);
        assert_eq!(config.breaker.reset_ttl_secs, 300);
        assert_eq!(config.services.len(), 1);
        let resource = &config.resources[0];
        assert_eq!(resource.tenant_field, "id_empresa");
        assert_eq!(resource.ttl(), Duration::from_secs(3_600));
        assert_eq!(resource.default, serde_json::Value::String(String::new()));
    }
}
