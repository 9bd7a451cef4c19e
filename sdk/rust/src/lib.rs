//! Client for the agent-gateway HTTP API.

pub mod client;

pub use client::{
    ChatReply, ChatRequest, ErrorBody, GatewayClient, Health, SdkError, ToolCall,
};
