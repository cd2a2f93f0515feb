//! Datagram-based ack server and client functionality
//!
//! This module provides a generic datagram ack server and a one-shot
//! datagram client that work with any datagram protocol.

pub mod client;
pub mod config;
pub mod protocol;
pub mod server;

pub use client::{DatagramClient, Reply};
pub use config::{DatagramClientConfig, DatagramClientConfigBuilder, DatagramServerConfig};
pub use protocol::DatagramProtocol;
pub use server::DatagramAckServer;
