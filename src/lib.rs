use crate::limits::LimitError;
use thiserror::Error;

/// Error types for the acksrv library
#[derive(Error, Debug)]
pub enum AckError {
    /// TCP-related errors (bind, connect, read, write)
    #[error("TCP error: {0}")]
    Tcp(#[from] std::io::Error),

    /// UDP-related errors (bind, send, receive)
    #[error("UDP error: {0}")]
    Udp(std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Host name resolution errors
    #[error("Resolve error: {0}")]
    Resolve(String),

    /// Timeout errors
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// UTF-8 decoding errors
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// The server is shutting down and the operation was abandoned
    #[error("Operation cancelled by shutdown")]
    Shutdown,
}

impl From<LimitError> for AckError {
    fn from(err: LimitError) -> Self {
        match err {
            LimitError::Closed => AckError::Shutdown,
            LimitError::InvalidCapacity => {
                AckError::Config("Handler limit must be at least 1".to_string())
            }
        }
    }
}

/// Result type for the acksrv library
pub type Result<T> = std::result::Result<T, AckError>;

pub mod common;
pub mod datagram;
pub mod limits;
pub mod network;
pub mod stream;
pub mod tcp;
pub mod udp;

// Re-export main types for convenience
pub use common::{AckServer, ExchangeClient, Receipt};
pub use datagram::{DatagramAckServer, DatagramClient, DatagramClientConfig, DatagramServerConfig};
pub use network::Endpoint;
pub use stream::{StreamAckServer, StreamClient, StreamClientConfig, StreamServerConfig};
pub use tcp::{TcpAckServer, TcpClient};
pub use udp::{UdpAckServer, UdpClient};
