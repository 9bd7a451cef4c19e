//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_upstream_calls_total` (counter): resilient calls by operation, outcome
//! - `gateway_upstream_duration_seconds` (histogram): resilient call latency
//! - `gateway_write_calls_total` (counter): write-path calls by operation, outcome
//! - `gateway_breaker_transitions_total` (counter): breaker opens/closes by breaker
//! - `gateway_cache_requests_total` (counter): cache lookups by resource, result
//! - `gateway_cache_entries` (gauge): cached entries by resource
//! - `gateway_agent_cache_total` (counter): agent handle hits/misses
//! - `gateway_chat_requests_total` (counter): inbound messages by outcome
//! - `gateway_chat_duration_seconds` (histogram): inbound message latency
//!
//! # Design Decisions
//! - Metrics are a sink only; nothing in the core reads them back
//! - Tenant and session ids are never labels (unbounded cardinality)

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one resilient (read-path) call.
pub fn record_upstream_call(operation: &str, outcome: &'static str, start: Instant) {
    counter!(
        "gateway_upstream_calls_total",
        "operation" => operation.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("gateway_upstream_duration_seconds", "operation" => operation.to_string())
        .record(start.elapsed().as_secs_f64());
}

/// Record one write-path call.
pub fn record_write_call(operation: &str, outcome: &'static str) {
    counter!(
        "gateway_write_calls_total",
        "operation" => operation.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a breaker state transition ("open" or "closed").
pub fn record_breaker_transition(breaker: &str, to: &'static str) {
    counter!(
        "gateway_breaker_transitions_total",
        "breaker" => breaker.to_string(),
        "to" => to
    )
    .increment(1);
}

/// Record a cache lookup ("hit", "miss" or "coalesced").
pub fn record_cache_lookup(resource: &str, result: &'static str) {
    counter!(
        "gateway_cache_requests_total",
        "resource" => resource.to_string(),
        "result" => result
    )
    .increment(1);
}

pub fn record_cache_size(resource: &str, size: usize) {
    gauge!("gateway_cache_entries", "resource" => resource.to_string()).set(size as f64);
}

/// Record an agent handle lookup ("hit" or "miss").
pub fn record_agent_cache(result: &'static str) {
    counter!("gateway_agent_cache_total", "result" => result).increment(1);
}

/// Record one inbound chat message.
pub fn record_chat_request(outcome: &'static str, start: Instant) {
    counter!("gateway_chat_requests_total", "outcome" => outcome).increment(1);
    histogram!("gateway_chat_duration_seconds").record(start.elapsed().as_secs_f64());
}
