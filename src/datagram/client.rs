use super::{DatagramClientConfig, DatagramProtocol};
use crate::common::ExchangeClient;
use crate::network::Endpoint;
use crate::{AckError, Result};
use async_trait::async_trait;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::time::timeout;
use tracing::{debug, info};

/// One reply datagram and the address it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub from: SocketAddr,
    pub data: Vec<u8>,
}

/// Generic datagram client that works with any datagram protocol
///
/// The client sends a datagram and waits for exactly one reply. The reply's
/// sender is not checked against the target; [`DatagramClient::send_and_receive`]
/// returns it so callers can.
///
/// # Examples
///
/// ```no_run
/// use acksrv::common::ExchangeClient;
/// use acksrv::datagram::DatagramClientConfig;
/// use acksrv::udp::UdpClient;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let target: acksrv::Endpoint = "127.0.0.1:4444".parse()?;
///     let mut client = UdpClient::connect(&target, DatagramClientConfig::default()).await?;
///
///     let reply = client.exchange_string("ABCDEF").await?;
///     println!("{reply}");
///     Ok(())
/// }
/// ```
pub struct DatagramClient<P: DatagramProtocol> {
    socket: P::Socket,
    target: SocketAddr,
    config: DatagramClientConfig,
}

impl<P: DatagramProtocol> DatagramClient<P> {
    /// Resolves `endpoint` and binds a local socket for talking to it
    ///
    /// No packets are sent; datagram protocols have no connection setup.
    pub async fn connect(endpoint: &Endpoint, config: DatagramClientConfig) -> Result<Self> {
        let target = endpoint.resolve().await?[0];

        let bind_addr = config.bind_addr.unwrap_or(match target {
            SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
        });
        let socket = P::bind(bind_addr).await?;
        let local = P::local_addr(&socket)?;
        debug!(%target, %local, "Datagram client ready");

        Ok(Self {
            socket,
            target,
            config,
        })
    }

    /// Address requests are sent to
    pub fn target(&self) -> SocketAddr {
        self.target
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        P::local_addr(&self.socket)
    }

    pub fn config(&self) -> &DatagramClientConfig {
        &self.config
    }

    /// Sends `payload` and waits for one reply datagram from any sender
    pub async fn send_and_receive(&mut self, payload: &[u8]) -> Result<Reply> {
        timeout(
            self.config.write_timeout,
            P::send_to(&self.socket, payload, self.target),
        )
        .await
        .map_err(|_| AckError::Timeout(format!("Sending to {} timed out", self.target)))??;
        debug!(target = %self.target, size = payload.len(), "Sent datagram");

        let mut buffer = vec![0u8; self.config.buffer_size];
        let (n, from) = timeout(
            self.config.read_timeout,
            P::recv_from(&self.socket, &mut buffer),
        )
        .await
        .map_err(|_| {
            AckError::Timeout(format!(
                "No reply from {} within {:?}",
                self.target, self.config.read_timeout
            ))
        })??;

        info!(%from, size = n, "Received reply");
        buffer.truncate(n);
        Ok(Reply { from, data: buffer })
    }
}

#[async_trait]
impl<P> ExchangeClient for DatagramClient<P>
where
    P: DatagramProtocol + Send,
{
    async fn exchange(&mut self, payload: &[u8]) -> Result<Vec<u8>> {
        Ok(self.send_and_receive(payload).await?.data)
    }
}
