use crate::common::Decoding;
use crate::network::DEFAULT_PORT;
use crate::{AckError, Result};
use bytes::Bytes;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Configuration for stream-based ack servers
///
/// # Examples
///
/// ```
/// use acksrv::stream::StreamServerConfig;
/// use std::time::Duration;
///
/// let config = StreamServerConfig {
///     bind_addr: "127.0.0.1:0".parse().unwrap(),
///     read_timeout: Duration::from_secs(5),
///     ..Default::default()
/// };
/// assert_eq!(config.backlog, 5);
/// ```
#[derive(Debug, Clone)]
pub struct StreamServerConfig {
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Listen backlog
    pub backlog: u32,
    /// Maximum number of connections handled at once
    pub max_connections: usize,
    /// Largest single read per connection
    pub buffer_size: usize,
    /// Bytes written back on every connection
    pub reply: Bytes,
    /// How received payloads are decoded
    pub decoding: Decoding,
    /// Deadline for the client's message
    pub read_timeout: Duration,
    /// Deadline for writing the reply
    pub write_timeout: Duration,
    /// How long shutdown waits for open connections before cancelling them
    pub shutdown_grace: Duration,
}

impl Default for StreamServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            backlog: 5,
            max_connections: 64,
            buffer_size: 1024,
            reply: Bytes::from_static(b"ACK"),
            decoding: Decoding::Lossy,
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl StreamServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(AckError::Config(
                "Stream buffer size must be at least 1".to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(AckError::Config(
                "max_connections must be at least 1".to_string(),
            ));
        }
        if self.backlog == 0 {
            return Err(AckError::Config("backlog must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Configuration for stream clients
#[derive(Debug, Clone)]
pub struct StreamClientConfig {
    /// Largest reply read in the single read the client performs
    pub buffer_size: usize,
    /// Deadline for each connection attempt
    pub connect_timeout: Duration,
    /// Deadline for the reply
    pub read_timeout: Duration,
    /// Deadline for writing the request
    pub write_timeout: Duration,
}

impl Default for StreamClientConfig {
    fn default() -> Self {
        Self {
            buffer_size: 4096,
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
        }
    }
}

/// Builder for stream client configuration
pub struct StreamClientConfigBuilder {
    config: StreamClientConfig,
}

impl StreamClientConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: StreamClientConfig::default(),
        }
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.buffer_size = size;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
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

    pub fn build(self) -> StreamClientConfig {
        self.config
    }
}

impl Default for StreamClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
