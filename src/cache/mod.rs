//! Read-path caching.
//!
//! # Data Flow
//! ```text
//! cached_fetch(resource_type, key)
//!     → ttl.rs (fresh hit? return)
//!     → single_flight.rs (wait for the key's slot)
//!     → ttl.rs (double-check, then fetch through ResilientCall and store)
//! ```

pub mod single_flight;
pub mod ttl;

pub use single_flight::{FlightGuard, SingleFlight};
pub use ttl::{CacheRegistry, CacheStats, TtlCache};
