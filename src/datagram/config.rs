use crate::common::Decoding;
use crate::network::DEFAULT_PORT;
use crate::{AckError, Result};
use bytes::Bytes;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Largest payload a UDP datagram can carry over IPv4
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Configuration for datagram-based ack servers
///
/// # Examples
///
/// ```
/// use acksrv::datagram::DatagramServerConfig;
///
/// let config = DatagramServerConfig {
///     bind_addr: "127.0.0.1:0".parse().unwrap(),
///     max_in_flight: 8,
///     ..Default::default()
/// };
/// assert_eq!(&config.reply[..], b"ACK");
/// ```
#[derive(Debug, Clone)]
pub struct DatagramServerConfig {
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Largest datagram the server reads; longer ones are truncated
    pub buffer_size: usize,
    /// Bytes sent back to every sender
    pub reply: Bytes,
    /// Maximum number of handlers running at once
    pub max_in_flight: usize,
    /// How received payloads are decoded
    pub decoding: Decoding,
    /// Deadline for sending a reply
    pub write_timeout: Duration,
    /// How long shutdown waits for in-flight handlers before cancelling them
    pub shutdown_grace: Duration,
}

impl Default for DatagramServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            buffer_size: 4096,
            reply: Bytes::from_static(b"ACK"),
            max_in_flight: 64,
            decoding: Decoding::Strict,
            write_timeout: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl DatagramServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 || self.buffer_size > MAX_DATAGRAM_SIZE {
            return Err(AckError::Config(format!(
                "Datagram buffer size must be between 1 and {MAX_DATAGRAM_SIZE}, got {}",
                self.buffer_size
            )));
        }
        if self.reply.len() > MAX_DATAGRAM_SIZE {
            return Err(AckError::Config(format!(
                "Reply of {} bytes does not fit in a datagram",
                self.reply.len()
            )));
        }
        if self.max_in_flight == 0 {
            return Err(AckError::Config(
                "max_in_flight must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for datagram clients
#[derive(Debug, Clone)]
pub struct DatagramClientConfig {
    /// Local address to bind; an ephemeral port of the target's family when unset
    pub bind_addr: Option<SocketAddr>,
    /// Largest reply the client reads
    pub buffer_size: usize,
    /// Deadline for the reply datagram
    pub read_timeout: Duration,
    /// Deadline for sending the request datagram
    pub write_timeout: Duration,
}

impl Default for DatagramClientConfig {
    fn default() -> Self {
        Self {
            bind_addr: None,
            buffer_size: 4096,
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
        }
    }
}

/// Builder for datagram client configuration
pub struct DatagramClientConfigBuilder {
    config: DatagramClientConfig,
}

impl DatagramClientConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: DatagramClientConfig::default(),
        }
    }

    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.config.bind_addr = Some(addr);
        self
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.buffer_size = size;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout = timeout;
        self
    }

    pub fn build(self) -> DatagramClientConfig {
        self.config
    }
}

impl Default for DatagramClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
