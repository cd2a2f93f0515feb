//! Stream-based ack server and client functionality
//!
//! This module provides a generic stream ack server and a one-shot
//! stream client that work with any stream protocol.

pub mod client;
pub mod config;
pub mod protocol;
pub mod server;

pub use client::StreamClient;
pub use config::{StreamClientConfig, StreamClientConfigBuilder, StreamServerConfig};
pub use protocol::StreamProtocol;
pub use server::StreamAckServer;
