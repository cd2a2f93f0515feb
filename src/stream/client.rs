use super::{StreamClientConfig, StreamProtocol};
use crate::common::ExchangeClient;
use crate::network::Endpoint;
use crate::{AckError, Result};
use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::time::timeout;
use tracing::{debug, info};

/// One-shot stream client
///
/// Sends a payload and performs a single read of up to `buffer_size` bytes.
/// Whatever that read returns is the reply; no framing is assumed.
///
/// # Examples
///
/// ```no_run
/// use acksrv::common::ExchangeClient;
/// use acksrv::stream::StreamClientConfig;
/// use acksrv::tcp::TcpClient;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let target: acksrv::Endpoint = "localhost:4444".parse()?;
///     let mut client = TcpClient::connect(&target, StreamClientConfig::default()).await?;
///
///     let reply = client.exchange_string("ABCDE").await?;
///     println!("{reply}");
///     Ok(())
/// }
/// ```
pub struct StreamClient<P: StreamProtocol> {
    stream: P::Stream,
    peer: SocketAddr,
    config: StreamClientConfig,
}

impl<P: StreamProtocol> StreamClient<P> {
    /// Resolves `endpoint` and connects to the first address that accepts
    pub async fn connect(endpoint: &Endpoint, config: StreamClientConfig) -> Result<Self> {
        let mut last_error = None;

        for addr in endpoint.resolve().await? {
            match timeout(config.connect_timeout, P::connect(addr)).await {
                Ok(Ok(stream)) => {
                    info!(%addr, "Connected");
                    return Ok(Self {
                        stream,
                        peer: addr,
                        config,
                    });
                }
                Ok(Err(e)) => {
                    debug!(%addr, error = %e, "Connection attempt failed");
                    last_error = Some(e);
                }
                Err(_) => {
                    debug!(%addr, "Connection attempt timed out");
                    last_error = Some(AckError::Timeout(format!("Connecting to {addr} timed out")));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AckError::Resolve(format!("No addresses for {endpoint}"))))
    }

    /// Address of the connected server
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn config(&self) -> &StreamClientConfig {
        &self.config
    }

    async fn send_and_receive(&mut self, payload: &[u8]) -> Result<Vec<u8>> {
        timeout(self.config.write_timeout, P::write(&mut self.stream, payload))
            .await
            .map_err(|_| AckError::Timeout("Write timeout".to_string()))??;

        timeout(self.config.write_timeout, P::flush(&mut self.stream))
            .await
            .map_err(|_| AckError::Timeout("Flush timeout".to_string()))??;
        debug!(peer = %self.peer, size = payload.len(), "Sent payload");

        let mut buffer = vec![0u8; self.config.buffer_size];
        let n = timeout(self.config.read_timeout, P::read(&mut self.stream, &mut buffer))
            .await
            .map_err(|_| {
                AckError::Timeout(format!(
                    "No reply from {} within {:?}",
                    self.peer, self.config.read_timeout
                ))
            })??;

        if n == 0 {
            info!(peer = %self.peer, "Server closed connection without replying");
        } else {
            info!(peer = %self.peer, size = n, "Received reply");
        }
        buffer.truncate(n);
        Ok(buffer)
    }
}

#[async_trait]
impl<P> ExchangeClient for StreamClient<P>
where
    P: StreamProtocol + Send,
{
    async fn exchange(&mut self, payload: &[u8]) -> Result<Vec<u8>> {
        self.send_and_receive(payload).await
    }
}
