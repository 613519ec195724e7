//! Core functionality for the relay

pub mod connection;
pub mod message;
pub mod registry;

// Re-export main components for convenience
pub use connection::Connection;
pub use message::{ClientMessage, ServerMessage};
pub use registry::{ConnectionRegistry, SharedRegistry};
