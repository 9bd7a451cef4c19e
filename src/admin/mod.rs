//! Admin API.
//!
//! Read-only views of the gateway's registries plus agent invalidation,
//! served on a separate bind address behind a Bearer token.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::gateway::Gateway;
use self::auth::{admin_auth_middleware, AdminKey};
use self::handlers::*;

#[derive(Clone)]
pub struct AdminState {
    pub gateway: Gateway,
}

pub fn setup_admin_router(gateway: Gateway, api_key: &str) -> Router {
    let key = AdminKey(Arc::from(api_key));
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/breakers", get(get_breakers))
        .route("/admin/caches", get(get_caches))
        .route("/admin/agents", get(get_agents))
        .route("/admin/agents/{tenant}/invalidate", post(invalidate_agent))
        .route("/admin/sessions", get(get_sessions))
        .layer(middleware::from_fn_with_state(key, admin_auth_middleware))
        .with_state(AdminState { gateway })
}
