use super::Receipt;
use crate::{AckError, Result};
use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::sync::{broadcast, mpsc, watch};

/// Common trait for acknowledgement servers
///
/// This trait defines the common interface that all ack servers
/// (TCP, UDP) implement.
#[async_trait]
pub trait AckServer {
    /// Binds the server and serves until a shutdown is requested
    async fn run(&self) -> Result<()>;

    /// Returns a shutdown signal sender that can be used to gracefully shutdown the server
    fn shutdown_signal(&self) -> broadcast::Sender<()>;

    /// Returns a watch on the bound address, `None` until the server is listening
    fn listening(&self) -> watch::Receiver<Option<SocketAddr>>;

    /// Takes the stream of payloads the server receives
    ///
    /// Only the first call returns the receiver, and it must be taken
    /// before `run` starts. Receipts are never dropped: once the
    /// receiver falls behind, handlers wait for it.
    fn receipts(&self) -> Option<mpsc::Receiver<Receipt>>;
}

/// Common trait for one-shot exchange clients
///
/// A client sends one payload and waits for a single reply.
#[async_trait]
pub trait ExchangeClient: Send {
    /// Sends `payload` and returns the raw reply
    async fn exchange(&mut self, payload: &[u8]) -> Result<Vec<u8>>;

    /// Sends a string and decodes the reply as UTF-8
    async fn exchange_string(&mut self, payload: &str) -> Result<String> {
        let reply = self.exchange(payload.as_bytes()).await?;
        String::from_utf8(reply).map_err(AckError::Utf8)
    }
}
