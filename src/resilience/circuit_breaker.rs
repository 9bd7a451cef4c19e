//! Circuit breaker for downstream protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: downstream assumed down for this partition, calls fail fast
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive transport failures >= threshold
//! Open → (reset_ttl elapsed) → reported Closed, next call goes through
//!     success → counter reset
//!     failure → re-opens immediately, timer re-stamped
//! ```
//!
//! # Design Decisions
//! - Per-partition state inside a named breaker (one breaker per downstream service)
//! - Fail fast in Open state (no waiting for timeout)
//! - Full traffic resumes after reset_ttl, there is no single-probe half-open state
//! - Only transport failures are recorded; received responses count as healthy

use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::client::types::PartitionKey;
use crate::config::BreakerConfig;
use crate::observability::metrics;

/// Externally visible breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakerState {
    Closed,
    Open,
}

#[derive(Debug, Default)]
struct PartitionState {
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

impl PartitionState {
    fn is_open(&self, reset_ttl: Duration, now: Instant) -> bool {
        match self.opened_at {
            Some(opened_at) => now.saturating_duration_since(opened_at) < reset_ttl,
            None => false,
        }
    }
}

/// Per-partition status for the liveness probe and admin API.
#[derive(Debug, Clone, Serialize)]
pub struct PartitionStatus {
    pub partition: String,
    pub state: BreakerState,
    pub consecutive_failures: u32,
    /// Seconds until an open breaker lets traffic through again.
    pub retry_in_secs: Option<u64>,
}

/// A named breaker holding state for every partition it has seen fail.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    threshold: u32,
    reset_ttl: Duration,
    partitions: DashMap<PartitionKey, PartitionState>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, threshold: u32, reset_ttl: Duration) -> Self {
        Self {
            name: name.into(),
            threshold: threshold.max(1),
            reset_ttl,
            partitions: DashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Non-blocking check, no I/O.
    pub fn is_open(&self, key: &PartitionKey) -> bool {
        let now = Instant::now();
        self.partitions
            .get(key)
            .map(|s| s.is_open(self.reset_ttl, now))
            .unwrap_or(false)
    }

    pub fn state(&self, key: &PartitionKey) -> BreakerState {
        if self.is_open(key) {
            BreakerState::Open
        } else {
            BreakerState::Closed
        }
    }

    /// Consecutive transport failures currently recorded for `key`.
    pub fn failures(&self, key: &PartitionKey) -> u32 {
        self.partitions
            .get(key)
            .map(|s| s.consecutive_failures)
            .unwrap_or(0)
    }

    /// Reset the counter and force Closed.
    pub fn record_success(&self, key: &PartitionKey) {
        // Partitions are only created by failures.
        if let Some(mut state) = self.partitions.get_mut(key) {
            let was_tripped = state.opened_at.is_some();
            state.consecutive_failures = 0;
            state.opened_at = None;
            if was_tripped {
                tracing::info!(breaker = %self.name, partition = %key, "Circuit breaker closed");
                metrics::record_breaker_transition(&self.name, "closed");
            }
        }
    }

    /// Count a transport failure; opens (or re-opens) at the threshold.
    pub fn record_failure(&self, key: &PartitionKey) {
        let now = Instant::now();
        let mut state = self.partitions.entry(key.clone()).or_default();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);

        if state.consecutive_failures >= self.threshold {
            let was_open = state.is_open(self.reset_ttl, now);
            state.opened_at = Some(now);
            if !was_open {
                tracing::warn!(
                    breaker = %self.name,
                    partition = %key,
                    failures = state.consecutive_failures,
                    threshold = self.threshold,
                    reset_ttl_secs = self.reset_ttl.as_secs(),
                    "Circuit breaker opened"
                );
                metrics::record_breaker_transition(&self.name, "open");
            }
        } else {
            tracing::debug!(
                breaker = %self.name,
                partition = %key,
                failures = state.consecutive_failures,
                threshold = self.threshold,
                "Transport failure recorded"
            );
        }
    }

    /// Status of every known partition, sorted by partition key.
    pub fn snapshot(&self) -> Vec<PartitionStatus> {
        let now = Instant::now();
        let mut statuses: Vec<_> = self
            .partitions
            .iter()
            .map(|entry| {
                let state = entry.value();
                let open = state.is_open(self.reset_ttl, now);
                let retry_in_secs = match (open, state.opened_at) {
                    (true, Some(opened_at)) => Some(
                        self.reset_ttl
                            .saturating_sub(now.saturating_duration_since(opened_at))
                            .as_secs(),
                    ),
                    _ => None,
                };
                PartitionStatus {
                    partition: entry.key().to_string(),
                    state: if open { BreakerState::Open } else { BreakerState::Closed },
                    consecutive_failures: state.consecutive_failures,
                    retry_in_secs,
                }
            })
            .collect();
        statuses.sort_by(|a, b| a.partition.cmp(&b.partition));
        statuses
    }
}

/// Named breakers, one per downstream service, created on first use.
#[derive(Debug)]
pub struct BreakerRegistry {
    config: BreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    /// Breaker for `name`, created lazily with the registry's settings.
    pub fn get(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.get(name) {
            return breaker.clone();
        }
        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(
                    name,
                    self.config.failure_threshold,
                    self.config.reset_ttl(),
                ))
            })
            .clone()
    }

    /// Per-breaker partition statuses.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<PartitionStatus>> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().snapshot()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new("informacion", 3, Duration::from_secs(300))
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_at_threshold_until_reset_ttl() {
        let cb = breaker();
        let key = PartitionKey::from("T1");

        cb.record_failure(&key);
        cb.record_failure(&key);
        assert!(!cb.is_open(&key));
        cb.record_failure(&key);
        assert!(cb.is_open(&key));
        assert_eq!(cb.state(&key), BreakerState::Open);

        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(cb.is_open(&key));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!cb.is_open(&key));
        assert_eq!(cb.state(&key), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_after_reset_reopens_and_restamps() {
        let cb = breaker();
        let key = PartitionKey::from("T1");
        for _ in 0..3 {
            cb.record_failure(&key);
        }
        tokio::time::advance(Duration::from_secs(301)).await;
        assert!(!cb.is_open(&key));

        cb.record_failure(&key);
        assert!(cb.is_open(&key));
        tokio::time::advance(Duration::from_secs(200)).await;
        assert!(cb.is_open(&key), "timer must restart from the latest failure");
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_counter_and_closes() {
        let cb = breaker();
        let key = PartitionKey::from("T1");
        for _ in 0..3 {
            cb.record_failure(&key);
        }
        tokio::time::advance(Duration::from_secs(301)).await;
        cb.record_success(&key);
        assert_eq!(cb.failures(&key), 0);
        assert_eq!(cb.state(&key), BreakerState::Closed);

        // Counter starts over: two failures are not enough.
        cb.record_failure(&key);
        cb.record_failure(&key);
        assert!(!cb.is_open(&key));
    }

    #[test]
    fn test_partitions_are_isolated() {
        let cb = breaker();
        let a = PartitionKey::from("A");
        let b = PartitionKey::from("B");
        for _ in 0..3 {
            cb.record_failure(&a);
        }
        assert!(cb.is_open(&a));
        assert!(!cb.is_open(&b));
        assert_eq!(cb.failures(&b), 0);
    }

    #[test]
    fn test_snapshot_and_registry() {
        let registry = BreakerRegistry::new(BreakerConfig {
            failure_threshold: 1,
            reset_ttl_secs: 60,
        });
        let info = registry.get("informacion");
        assert!(Arc::ptr_eq(&info, &registry.get("informacion")));

        info.record_failure(&PartitionKey::from("T1"));
        registry.get("calendario").record_failure(&PartitionKey::global());
        registry.get("calendario").record_success(&PartitionKey::global());

        let snapshot = registry.snapshot();
        assert_eq!(snapshot["informacion"][0].state, BreakerState::Open);
        assert!(snapshot["informacion"][0].retry_in_secs.is_some());
        assert_eq!(snapshot["calendario"][0].state, BreakerState::Closed);
    }
}
