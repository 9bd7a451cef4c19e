//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Read call to a downstream service:
//!     → call.rs (consult circuit_breaker.rs; fail fast when open)
//!     → retries.rs (attempt, retry transport failures with backoff.rs)
//!     → call.rs (record success/failure on the partition's breaker)
//!
//! Inbound request:
//!     → timeouts.rs (overall deadline around the whole flow)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every inbound request has a deadline
//! - Retries only on the read path; writes bypass this module entirely
//! - Circuit breaker prevents cascading failures, scoped per partition

pub mod backoff;
pub mod call;
pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;

pub use call::ResilientCall;
pub use circuit_breaker::{BreakerRegistry, BreakerState, CircuitBreaker, PartitionStatus};
pub use retries::RetryingInvoker;
pub use timeouts::with_deadline;
