//! Seam to the reasoning engine.
//!
//! # Data Flow
//! ```text
//! Gateway::handle_message
//!     → ReasoningEngine::handle(message, session, context, toolbox)
//!         → toolbox.read  → TTL cache → ResilientCall → SharedClient
//!         → toolbox.write → SharedClient (single attempt)
//! ```
//!
//! The engine itself is opaque. [`RemoteEngine`] forwards each turn over
//! HTTP; an out-of-process engine reaches the toolbox through the
//! `/v1/tools/*` endpoints.

pub mod remote;
pub mod toolbox;

use futures_util::future::BoxFuture;

use crate::agents::TenantContext;
use crate::client::types::GatewayResult;

pub use remote::RemoteEngine;
pub use toolbox::Toolbox;

/// Produces a reply for one message of one conversation.
pub trait ReasoningEngine: Send + Sync {
    fn handle<'a>(
        &'a self,
        message: &'a str,
        session_id: &'a str,
        context: &'a TenantContext,
        toolbox: &'a Toolbox,
    ) -> BoxFuture<'a, GatewayResult<String>>;
}
