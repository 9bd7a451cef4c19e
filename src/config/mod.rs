//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → handed to Gateway::new, which builds every registry from it
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of the service endpoint table
//! ```
//!
//! # Design Decisions
//! - Only downstream endpoints are hot-swappable; breaker, cache and
//!   timeout settings apply on restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError, CONFIG_ENV};
pub use schema::{
    AdminConfig, AgentCacheConfig, BreakerConfig, ClientConfig, EngineConfig, GatewayConfig,
    ListenerConfig, ObservabilityConfig, ResourceConfig, RetryConfig, ServiceConfig, SessionConfig,
    TimeoutConfig, ToolConfig,
};
