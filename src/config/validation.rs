//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (resources reference existing services)
//! - Validate value ranges (timeouts > 0, thresholds > 0, URLs parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;

use crate::config::schema::GatewayConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError::new("listener.bind_address", "must be a socket address"));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be > 0"));
    }
    if config.admin.enabled && config.admin.api_key.trim().is_empty() {
        errors.push(ValidationError::new("admin.api_key", "must not be empty when admin is enabled"));
    }
    if config.client.timeout_secs == 0 {
        errors.push(ValidationError::new("client.timeout_secs", "must be > 0"));
    }
    if config.client.operation_field.trim().is_empty() {
        errors.push(ValidationError::new("client.operation_field", "must not be empty"));
    }
    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be >= 1"));
    }
    if config.retries.wait_min_ms > config.retries.wait_max_ms {
        errors.push(ValidationError::new("retries.wait_min_ms", "must not exceed wait_max_ms"));
    }
    if config.breaker.failure_threshold == 0 {
        errors.push(ValidationError::new("breaker.failure_threshold", "must be > 0"));
    }
    if config.agents.max_size == 0 {
        errors.push(ValidationError::new("agents.max_size", "must be > 0"));
    }

    // The overall deadline must cover a full retry sequence.
    let attempts = u64::from(config.retries.max_attempts.max(1));
    let per_call = config
        .client
        .timeout_secs
        .saturating_mul(attempts)
        .saturating_add(config.retries.wait_max_ms.saturating_mul(attempts - 1) / 1_000);
    if config.timeouts.request_secs <= per_call {
        errors.push(ValidationError::new(
            "timeouts.request_secs",
            format!("must exceed the worst-case call duration ({}s)", per_call),
        ));
    }

    if url::Url::parse(&config.engine.url).is_err() {
        errors.push(ValidationError::new("engine.url", "must be a valid URL"));
    }

    let mut names = HashSet::new();
    for (i, service) in config.services.iter().enumerate() {
        if !names.insert(service.name.as_str()) {
            errors.push(ValidationError::new(
                format!("services[{}].name", i),
                format!("duplicate service '{}'", service.name),
            ));
        }
        if url::Url::parse(&service.url).is_err() {
            errors.push(ValidationError::new(format!("services[{}].url", i), "must be a valid URL"));
        }
    }

    let mut resource_names = HashSet::new();
    for (i, resource) in config.resources.iter().enumerate() {
        if !resource_names.insert(resource.name.as_str()) {
            errors.push(ValidationError::new(
                format!("resources[{}].name", i),
                format!("duplicate resource '{}'", resource.name),
            ));
        }
        if !names.contains(resource.service.as_str()) {
            errors.push(ValidationError::new(
                format!("resources[{}].service", i),
                format!("unknown service '{}'", resource.service),
            ));
        }
        if resource.ttl_secs == 0 {
            errors.push(ValidationError::new(format!("resources[{}].ttl_secs", i), "must be > 0"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{ResourceConfig, ServiceConfig};

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = GatewayConfig::default();
        config.retries.max_attempts = 0;
        config.breaker.failure_threshold = 0;
        config.services.push(ServiceConfig { name: "a".into(), url: "not a url".into() });
        config.resources.push(ResourceConfig {
            name: "ctx".into(),
            service: "missing".into(),
            operation: "OP".into(),
            tenant_field: "id".into(),
            response_field: None,
            ttl_secs: 60,
            max_entries: 10,
            default: serde_json::Value::Null,
        });

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"retries.max_attempts"));
        assert!(fields.contains(&"breaker.failure_threshold"));
        assert!(fields.contains(&"services[0].url"));
        assert!(fields.contains(&"resources[0].service"));
    }

    #[test]
    fn test_deadline_must_exceed_call_budget() {
        let mut config = GatewayConfig::default();
        config.timeouts.request_secs = 5;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "timeouts.request_secs");
    }

    #[test]
    fn test_oversized_retry_budget_is_reported() {
        let mut config = GatewayConfig::default();
        config.client.timeout_secs = u64::MAX;
        config.retries.max_attempts = u32::MAX;
        config.retries.wait_max_ms = u64::MAX;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "timeouts.request_secs"));
    }
}
