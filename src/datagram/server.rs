use super::{DatagramProtocol, DatagramServerConfig};
use crate::common::lifecycle::{
    ServerSignals, drain_handlers, log_join, publish, shutdown_requested,
};
use crate::common::{AckServer, Decoding, Receipt};
use crate::limits::{HandlerGuard, HandlerLimiter};
use crate::{AckError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, warn};

/// Generic datagram ack server that works with any datagram protocol
///
/// Every datagram is decoded, published as a [`Receipt`] and answered with
/// the configured reply. At most `max_in_flight` handlers run at once; while
/// all slots are taken the server stops reading and datagrams wait in the
/// socket buffer.
///
/// # Examples
///
/// Server with graceful shutdown:
///
/// ```no_run
/// use acksrv::common::AckServer;
/// use acksrv::datagram::DatagramServerConfig;
/// use acksrv::udp::UdpAckServer;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let server = UdpAckServer::new(DatagramServerConfig::default());
///     let shutdown_signal = server.shutdown_signal();
///
///     let server_handle = tokio::spawn(async move { server.run().await });
///
///     // Do other work...
///
///     let _ = shutdown_signal.send(());
///     server_handle.await??;
///     Ok(())
/// }
/// ```
pub struct DatagramAckServer<P: DatagramProtocol> {
    config: DatagramServerConfig,
    protocol: std::marker::PhantomData<P>,
    signals: ServerSignals,
}

/// State every handler task shares
struct HandlerContext<S> {
    socket: Arc<S>,
    reply: Bytes,
    decoding: Decoding,
    write_timeout: Duration,
    receipts: mpsc::Sender<Receipt>,
    cancel: CancellationToken,
}

impl<P> DatagramAckServer<P>
where
    P: DatagramProtocol + Send + Sync + 'static,
{
    /// Creates a new datagram ack server with the given configuration
    pub fn new(config: DatagramServerConfig) -> Self {
        Self {
            config,
            protocol: std::marker::PhantomData,
            signals: ServerSignals::new(),
        }
    }

    pub fn config(&self) -> &DatagramServerConfig {
        &self.config
    }

    async fn handle_datagram(
        ctx: Arc<HandlerContext<P::Socket>>,
        payload: Bytes,
        peer: SocketAddr,
        _guard: HandlerGuard,
    ) {
        if let Err(e) = Self::acknowledge(&ctx, &payload, peer).await {
            error!(%peer, error = %e, "Failed to acknowledge datagram");
        }
    }

    async fn acknowledge(
        ctx: &HandlerContext<P::Socket>,
        payload: &[u8],
        peer: SocketAddr,
    ) -> Result<()> {
        let text = ctx.decoding.decode(payload)?;
        info!(%peer, size = payload.len(), preview = %text, "Received datagram");
        publish(
            &ctx.receipts,
            Receipt {
                peer,
                payload: text,
            },
            &ctx.cancel,
        )
        .await?;

        tokio::select! {
            sent = timeout(ctx.write_timeout, P::send_to(&ctx.socket, &ctx.reply, peer)) => {
                sent.map_err(|_| AckError::Timeout(format!("Sending reply to {peer} timed out")))??;
            }
            _ = ctx.cancel.cancelled() => {
                return Err(AckError::Shutdown);
            }
        }

        info!(%peer, size = ctx.reply.len(), "Acknowledged datagram");
        Ok(())
    }
}

#[async_trait]
impl<P> AckServer for DatagramAckServer<P>
where
    P: DatagramProtocol + Send + Sync + 'static,
{
    /// Starts the datagram ack server and serves until shutdown
    async fn run(&self) -> Result<()> {
        self.config.validate()?;
        // Subscribe before publishing the address so no stop request is missed
        let mut shutdown_rx = self.signals.subscribe_shutdown();
        self.signals.release_unclaimed_receipts();
        let limiter = HandlerLimiter::new(self.config.max_in_flight)?;

        let socket = Arc::new(P::bind(self.config.bind_addr).await?);
        let local_addr = P::local_addr(&socket)?;
        info!(address = %local_addr, max_in_flight = self.config.max_in_flight, "Datagram ack server listening");
        self.signals.set_listening(Some(local_addr));

        let cancel = CancellationToken::new();
        let ctx = Arc::new(HandlerContext {
            socket: socket.clone(),
            reply: self.config.reply.clone(),
            decoding: self.config.decoding,
            write_timeout: self.config.write_timeout,
            receipts: self.signals.receipt_sender(),
            cancel: cancel.clone(),
        });

        let mut handlers = JoinSet::new();
        let mut buffer = vec![0u8; self.config.buffer_size];

        'serve: loop {
            // Wait for a free slot before reading so excess datagrams stay queued
            let guard = loop {
                tokio::select! {
                    guard = limiter.acquire() => break guard?,
                    Some(joined) = handlers.join_next() => log_join(joined),
                    _ = shutdown_requested(&mut shutdown_rx) => break 'serve,
                }
            };

            let (n, peer) = tokio::select! {
                received = P::recv_from(&socket, &mut buffer) => match received {
                    Ok(received) => received,
                    Err(e) => {
                        error!(error = %e, "Failed to receive datagram");
                        continue;
                    }
                },
                _ = shutdown_requested(&mut shutdown_rx) => break 'serve,
            };

            if n == buffer.len() {
                warn!(%peer, size = n, "Datagram may have been truncated");
            }

            let payload = Bytes::copy_from_slice(&buffer[..n]);
            let span = tracing::info_span!("datagram", %peer, size = n);
            handlers.spawn(Self::handle_datagram(ctx.clone(), payload, peer, guard).instrument(span));
        }

        limiter.close();
        drain_handlers(&mut handlers, &cancel, self.config.shutdown_grace).await;
        self.signals.set_listening(None);

        let metrics = limiter.metrics();
        info!(handled = metrics.total, "Datagram ack server stopped");
        Ok(())
    }

    /// Returns a shutdown signal sender that can be used to gracefully shutdown the server
    fn shutdown_signal(&self) -> broadcast::Sender<()> {
        self.signals.shutdown_sender()
    }

    fn listening(&self) -> watch::Receiver<Option<SocketAddr>> {
        self.signals.watch_listening()
    }

    fn receipts(&self) -> Option<mpsc::Receiver<Receipt>> {
        self.signals.take_receipts()
    }
}
