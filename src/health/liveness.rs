//! Aggregated breaker view for the liveness probe.

use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;

use crate::resilience::circuit_breaker::{BreakerRegistry, BreakerState, PartitionStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LivenessStatus {
    Ok,
    Degraded,
}

#[derive(Debug, Clone, Serialize)]
pub struct Liveness {
    pub status: LivenessStatus,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub open_partitions: usize,
    pub breakers: BTreeMap<String, Vec<PartitionStatus>>,
}

impl Liveness {
    pub fn collect(registry: &BreakerRegistry, started_at: Instant) -> Self {
        let breakers = registry.snapshot();
        let open_partitions = breakers
            .values()
            .flatten()
            .filter(|p| p.state == BreakerState::Open)
            .count();

        let status = if open_partitions == 0 {
            LivenessStatus::Ok
        } else {
            LivenessStatus::Degraded
        };

        Self {
            status,
            version: env!("CARGO_PKG_VERSION"),
            uptime_secs: started_at.elapsed().as_secs(),
            open_partitions,
            breakers,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == LivenessStatus::Ok
    }
}
