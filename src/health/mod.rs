//! Liveness reporting.
//!
//! # Data Flow
//! ```text
//! GET /health
//!     → liveness.rs (snapshot every named breaker)
//!     → "ok" when every partition is closed, "degraded" otherwise
//! ```
//!
//! # Design Decisions
//! - Passive and read-only: the probe never calls downstream services
//! - Always answers 200; an open breaker degrades, it does not kill the process

pub mod liveness;

pub use liveness::{Liveness, LivenessStatus};
