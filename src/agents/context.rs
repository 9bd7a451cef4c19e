//! Per-tenant context assembly.
//!
//! Every configured resource is fetched concurrently. A failed read never
//! fails the build: the resource's configured default is used instead and
//! the resource is listed as degraded.

use futures_util::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;

use crate::client::types::GatewayResult;
use crate::config::ResourceConfig;

/// Context handed to the reasoning engine for one tenant.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct TenantContext {
    pub tenant_id: String,
    pub sections: BTreeMap<String, serde_json::Value>,
    /// Resources that fell back to their default.
    pub degraded: Vec<String>,
}

impl TenantContext {
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }

    pub fn section(&self, name: &str) -> Option<&serde_json::Value> {
        self.sections.get(name)
    }
}

/// Pick the configured response field out of a successful body.
///
/// Missing, null and blank-string values resolve to the resource default.
pub fn extract_section(resource: &ResourceConfig, body: serde_json::Value) -> serde_json::Value {
    let value = match &resource.response_field {
        Some(field) => body.get(field).cloned().unwrap_or(serde_json::Value::Null),
        None => body,
    };
    match value {
        serde_json::Value::Null => resource.default.clone(),
        serde_json::Value::String(s) if s.trim().is_empty() => resource.default.clone(),
        serde_json::Value::String(s) => serde_json::Value::String(s.trim().to_string()),
        other => other,
    }
}

/// Fetch all `resources` for `tenant_id` in parallel.
pub async fn assemble<'a, F, Fut>(
    tenant_id: &str,
    resources: &'a [ResourceConfig],
    fetch: F,
) -> TenantContext
where
    F: Fn(&'a ResourceConfig) -> Fut,
    Fut: Future<Output = GatewayResult<serde_json::Value>>,
{
    let results = join_all(resources.iter().map(|resource| fetch(resource))).await;

    let mut context = TenantContext {
        tenant_id: tenant_id.to_string(),
        ..Default::default()
    };
    for (resource, result) in resources.iter().zip(results) {
        let value = match result {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(
                    tenant = %tenant_id,
                    resource = %resource.name,
                    error = %e,
                    error_kind = e.kind(),
                    "Context read failed, using default"
                );
                context.degraded.push(resource.name.clone());
                resource.default.clone()
            }
        };
        context.sections.insert(resource.name.clone(), value);
    }
    context
}
