//! Tenant-scoped tool routing.

use serde_json::{Map, Value};

use crate::client::types::{GatewayResult, OperationRequest, PartitionKey};
use crate::gateway::Gateway;

/// Tool invocations available to the engine for one tenant.
///
/// Reads are idempotent: cached per (service, operation, tenant, fields), retried on
/// transport failure and guarded by the service's breaker under the tenant's
/// partition. Writes go out exactly once, with no cache and no breaker.
#[derive(Clone)]
pub struct Toolbox {
    gateway: Gateway,
    tenant: PartitionKey,
}

impl Toolbox {
    pub fn new(gateway: Gateway, tenant: PartitionKey) -> Self {
        Self { gateway, tenant }
    }

    pub fn tenant(&self) -> &PartitionKey {
        &self.tenant
    }

    pub async fn read(&self, service: &str, operation: &str, fields: Map<String, Value>) -> GatewayResult<Value> {
        let request = OperationRequest {
            service: service.to_string(),
            operation: operation.to_string(),
            fields,
        };
        self.gateway.tool_read(&self.tenant, request).await
    }

    pub async fn write(&self, service: &str, operation: &str, fields: Map<String, Value>) -> GatewayResult<Value> {
        let request = OperationRequest {
            service: service.to_string(),
            operation: operation.to_string(),
            fields,
        };
        self.gateway.tool_write(&self.tenant, request).await
    }
}

/// Cache key for a tool read: operation, tenant, then the fields in key order.
pub fn read_cache_key(operation: &str, tenant: &PartitionKey, fields: &Map<String, Value>) -> String {
    // serde_json's default map is ordered, so serialization is canonical.
    format!("{}:{}:{}", operation, tenant, Value::Object(fields.clone()))
}
