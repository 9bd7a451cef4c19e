//! Shared outbound HTTP client.
//!
//! # Responsibilities
//! - Own the process-wide connection pool (one `reqwest::Client`)
//! - Resolve service names to endpoint URLs
//! - Send one request, classify raw failures into the gateway taxonomy
//!
//! # Design Decisions
//! - A single attempt per `send`; retry and breaker logic live in `resilience`
//! - Any received response is returned as-is, status interpretation is the caller's
//! - Endpoint table sits behind `ArcSwap` so reloads never block in-flight calls

use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::client::types::{GatewayError, GatewayResult, OperationRequest, RemoteResponse};
use crate::config::{ClientConfig, ServiceConfig};

/// Service name -> endpoint URL.
#[derive(Debug, Clone, Default)]
pub struct ServiceDirectory {
    endpoints: HashMap<String, Url>,
}

impl ServiceDirectory {
    /// Build from config; entries with invalid URLs are skipped with a warning.
    pub fn from_config(services: &[ServiceConfig]) -> Self {
        let mut endpoints = HashMap::new();
        for service in services {
            match Url::parse(&service.url) {
                Ok(url) => {
                    endpoints.insert(service.name.clone(), url);
                }
                Err(e) => {
                    tracing::warn!(service = %service.name, url = %service.url, error = %e, "Ignoring invalid service URL");
                }
            }
        }
        Self { endpoints }
    }

    pub fn get(&self, service: &str) -> Option<&Url> {
        self.endpoints.get(service)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.endpoints.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Pooled outbound client, one per process.
#[derive(Clone)]
pub struct SharedClient {
    http: reqwest::Client,
    directory: Arc<ArcSwap<ServiceDirectory>>,
    operation_field: Arc<str>,
}

impl SharedClient {
    /// Build the pooled client.
    pub fn new(config: &ClientConfig, services: &[ServiceConfig]) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        let directory = ServiceDirectory::from_config(services);
        tracing::info!(
            services = ?directory.names(),
            timeout_secs = config.timeout_secs,
            pool_max_idle_per_host = config.pool_max_idle_per_host,
            "Shared client initialized"
        );

        Ok(Self {
            http,
            directory: Arc::new(ArcSwap::from_pointee(directory)),
            operation_field: Arc::from(config.operation_field.as_str()),
        })
    }

    /// Replace the endpoint table (config reload).
    pub fn update_services(&self, services: &[ServiceConfig]) {
        let directory = ServiceDirectory::from_config(services);
        tracing::info!(services = ?directory.names(), "Service endpoints updated");
        self.directory.store(Arc::new(directory));
    }

    /// Current endpoint table.
    pub fn directory(&self) -> Arc<ServiceDirectory> {
        self.directory.load_full()
    }

    /// Send one operation to its service. Exactly one network attempt.
    pub async fn send(&self, request: &OperationRequest) -> GatewayResult<RemoteResponse> {
        let url = self
            .directory
            .load()
            .get(&request.service)
            .cloned()
            .ok_or_else(|| {
                GatewayError::Validation(format!("unknown service '{}'", request.service))
            })?;

        let body = request.to_body(&self.operation_field);
        tracing::debug!(
            service = %request.service,
            operation = %request.operation,
            url = %url,
            "Sending downstream request"
        );
        self.post_json(&request.operation, url, &body).await
    }

    /// POST a JSON body to an explicit URL. Exactly one network attempt.
    pub async fn post_json(
        &self,
        operation: &str,
        url: Url,
        body: &serde_json::Value,
    ) -> GatewayResult<RemoteResponse> {
        let response = self
            .http
            .post(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| GatewayError::from_reqwest(operation, &e))?;

        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| GatewayError::from_reqwest(operation, &e))?;

        // Non-JSON bodies are kept as text; they are still a received response.
        let body = serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            serde_json::Value::String(String::from_utf8_lossy(&bytes).into_owned())
        });

        Ok(RemoteResponse { status, body })
    }
}

impl std::fmt::Debug for SharedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedClient")
            .field("services", &self.directory.load().names())
            .field("operation_field", &self.operation_field)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn services() -> Vec<ServiceConfig> {
        vec![
            ServiceConfig { name: "informacion".into(), url: "http://127.0.0.1:1/info".into() },
            ServiceConfig { name: "broken".into(), url: "::nope::".into() },
        ]
    }

    #[test]
    fn test_directory_skips_invalid_urls() {
        let directory = ServiceDirectory::from_config(&services());
        assert!(directory.get("informacion").is_some());
        assert!(directory.get("broken").is_none());
        assert_eq!(directory.names(), vec!["informacion".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_service_is_validation_error() {
        let client = SharedClient::new(&ClientConfig::default(), &services()).unwrap();
        let err = client
            .send(&OperationRequest::new("missing", "OP"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let client = SharedClient::new(&ClientConfig::default(), &services()).unwrap();
        let err = client
            .send(&OperationRequest::new("informacion", "OP"))
            .await
            .unwrap_err();
        assert!(err.is_transport(), "got {:?}", err);
    }

    #[test]
    fn test_update_services_swaps_table() {
        let client = SharedClient::new(&ClientConfig::default(), &services()).unwrap();
        client.update_services(&[ServiceConfig {
            name: "calendario".into(),
            url: "http://127.0.0.1:2/cal".into(),
        }]);
        let directory = client.directory();
        assert!(directory.get("informacion").is_none());
        assert!(directory.get("calendario").is_some());
    }
}
