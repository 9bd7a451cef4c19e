//! Per-tenant agents.
//!
//! # Data Flow
//! ```text
//! get_or_build_agent(tenant)
//!     → handle_cache.rs (fresh handle? return; otherwise single-flight build)
//!     → context.rs (parallel context reads through the TTL caches)
//! ```

pub mod context;
pub mod handle_cache;

pub use context::{assemble, TenantContext};
pub use handle_cache::{AgentHandle, AgentHandleCache, AgentSummary};
