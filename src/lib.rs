//! Resilient multi-tenant outbound-call layer for an agent gateway.

pub mod admin;
pub mod agents;
pub mod cache;
pub mod client;
pub mod config;
pub mod engine;
pub mod gateway;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod sessions;

pub use config::schema::GatewayConfig;
pub use gateway::{ChatReply, ChatRequest, Gateway};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
