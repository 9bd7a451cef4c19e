use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::admin::AdminState;
use crate::agents::AgentSummary;
use crate::cache::CacheStats;
use crate::health::LivenessStatus;
use crate::resilience::PartitionStatus;
use crate::sessions::SessionStats;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: LivenessStatus,
    pub uptime_secs: u64,
    pub services: Vec<String>,
    pub agents: usize,
    pub session_locks: usize,
    pub open_partitions: usize,
}

#[derive(Serialize)]
pub struct Invalidated {
    pub tenant_id: String,
    pub removed: bool,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let gateway = &state.gateway;
    let liveness = gateway.liveness();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: liveness.status,
        uptime_secs: gateway.uptime().as_secs(),
        services: gateway.client().directory().names(),
        agents: gateway.agents().len(),
        session_locks: gateway.sessions().len(),
        open_partitions: liveness.open_partitions,
    })
}

pub async fn get_breakers(State(state): State<AdminState>) -> Json<BTreeMap<String, Vec<PartitionStatus>>> {
    Json(state.gateway.breakers().snapshot())
}

pub async fn get_caches(State(state): State<AdminState>) -> Json<BTreeMap<String, CacheStats>> {
    Json(state.gateway.caches().stats())
}

pub async fn get_agents(State(state): State<AdminState>) -> Json<Vec<AgentSummary>> {
    Json(state.gateway.agents().summaries())
}

pub async fn get_sessions(State(state): State<AdminState>) -> Json<SessionStats> {
    Json(state.gateway.sessions().stats())
}

pub async fn invalidate_agent(
    State(state): State<AdminState>,
    Path(tenant): Path<String>,
) -> (StatusCode, Json<Invalidated>) {
    let removed = state.gateway.agents().invalidate(&tenant);
    let status = if removed { StatusCode::OK } else { StatusCode::NOT_FOUND };
    (
        status,
        Json(Invalidated {
            tenant_id: tenant,
            removed,
        }),
    )
}
