//! Outbound transport subsystem.
//!
//! # Data Flow
//! ```text
//! Read path:   resilience::call → shared.rs (one attempt per retry)
//! Write path:  gateway::submit_write → shared.rs (exactly one attempt)
//! ```
//!
//! # Design Decisions
//! - One pooled client per process, cloned cheaply into every component
//! - Raw reqwest failures never leave this module unclassified

pub mod shared;
pub mod types;

pub use shared::{ServiceDirectory, SharedClient};
pub use types::{
    GatewayError, GatewayResult, OperationRequest, PartitionKey, RemoteResponse, TransportKind,
};
