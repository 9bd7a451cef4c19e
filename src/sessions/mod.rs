//! Conversation ordering.

pub mod serializer;

pub use serializer::{SessionSerializer, SessionStats};
