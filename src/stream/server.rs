use super::{StreamProtocol, StreamServerConfig};
use crate::common::lifecycle::{
    Feed, ServerSignals, drain_handlers, log_join, publish, shutdown_requested,
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
use tracing::{Instrument, debug, error, info, warn};

/// Generic stream-based ack server that works with any stream protocol
///
/// Each connection gets one read. The payload is published as a
/// [`Receipt`], the reply is written and the connection is closed.
///
/// # Examples
///
/// ```no_run
/// use acksrv::common::AckServer;
/// use acksrv::stream::StreamServerConfig;
/// use acksrv::tcp::TcpAckServer;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let server = TcpAckServer::new(StreamServerConfig::default());
///     server.run().await?;
///     Ok(())
/// }
/// ```
pub struct StreamAckServer<P: StreamProtocol> {
    config: StreamServerConfig,
    protocol: std::marker::PhantomData<P>,
    signals: ServerSignals,
    connections: Feed<SocketAddr>,
}

struct ConnectionContext {
    buffer_size: usize,
    reply: Bytes,
    decoding: Decoding,
    read_timeout: Duration,
    write_timeout: Duration,
    receipts: mpsc::Sender<Receipt>,
    connections: mpsc::Sender<SocketAddr>,
    cancel: CancellationToken,
}

impl<P> StreamAckServer<P>
where
    P: StreamProtocol + Send + Sync + 'static,
{
    /// Creates a new stream-based ack server with the given configuration
    pub fn new(config: StreamServerConfig) -> Self {
        Self {
            config,
            protocol: std::marker::PhantomData,
            signals: ServerSignals::new(),
            connections: Feed::new(),
        }
    }

    pub fn config(&self) -> &StreamServerConfig {
        &self.config
    }

    /// Takes the stream of accepted peer addresses
    ///
    /// Like [`AckServer::receipts`], only the first call before `run`
    /// returns the receiver, and no address is ever dropped.
    pub fn connections(&self) -> Option<mpsc::Receiver<SocketAddr>> {
        self.connections.take()
    }

    async fn handle_connection(
        ctx: Arc<ConnectionContext>,
        mut stream: P::Stream,
        peer: SocketAddr,
        _guard: HandlerGuard,
    ) {
        if let Err(e) = Self::acknowledge(&ctx, &mut stream, peer).await {
            error!(%peer, error = %e, "Error handling connection");
        }
        if let Err(e) = P::shutdown(&mut stream).await {
            debug!(%peer, error = %e, "Failed to shut down connection");
        }
        info!(%peer, "Connection closed");
    }

    async fn acknowledge(
        ctx: &ConnectionContext,
        stream: &mut P::Stream,
        peer: SocketAddr,
    ) -> Result<()> {
        publish(&ctx.connections, peer, &ctx.cancel).await?;

        let mut buffer = vec![0u8; ctx.buffer_size];

        let n = tokio::select! {
            read = timeout(ctx.read_timeout, P::read(stream, &mut buffer)) => match read {
                Ok(read) => read?,
                Err(_) => {
                    warn!(%peer, "Read timeout");
                    return Ok(());
                }
            },
            _ = ctx.cancel.cancelled() => return Err(AckError::Shutdown),
        };

        if n == 0 {
            info!(%peer, "Client closed connection");
            return Ok(());
        }

        let text = ctx.decoding.decode(&buffer[..n])?;
        info!(%peer, size = n, preview = %text, "Received data");
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
            written = timeout(ctx.write_timeout, async {
                P::write(stream, &ctx.reply).await?;
                P::flush(stream).await?;
                Ok::<_, AckError>(())
            }) => {
                written.map_err(|_| AckError::Timeout(format!("Writing reply to {peer} timed out")))??;
            }
            _ = ctx.cancel.cancelled() => return Err(AckError::Shutdown),
        }

        info!(%peer, size = ctx.reply.len(), "Acknowledged");
        Ok(())
    }
}

#[async_trait]
impl<P> AckServer for StreamAckServer<P>
where
    P: StreamProtocol + Send + Sync + 'static,
{
    /// Starts the stream-based ack server and serves until shutdown
    async fn run(&self) -> Result<()> {
        self.config.validate()?;
        // Subscribe before publishing the address so no stop request is missed
        let mut shutdown_rx = self.signals.subscribe_shutdown();
        self.signals.release_unclaimed_receipts();
        self.connections.release_unclaimed();
        let limiter = HandlerLimiter::new(self.config.max_connections)?;

        let listener = P::bind(self.config.bind_addr, self.config.backlog).await?;
        let local_addr = P::local_addr(&listener)?;
        info!(address = %local_addr, max_connections = self.config.max_connections, "Stream ack server listening");
        self.signals.set_listening(Some(local_addr));

        let cancel = CancellationToken::new();
        let ctx = Arc::new(ConnectionContext {
            buffer_size: self.config.buffer_size,
            reply: self.config.reply.clone(),
            decoding: self.config.decoding,
            read_timeout: self.config.read_timeout,
            write_timeout: self.config.write_timeout,
            receipts: self.signals.receipt_sender(),
            connections: self.connections.sender(),
            cancel: cancel.clone(),
        });

        let mut handlers = JoinSet::new();

        'serve: loop {
            // Connections beyond the limit wait in the listen backlog
            let guard = loop {
                tokio::select! {
                    guard = limiter.acquire() => break guard?,
                    Some(joined) = handlers.join_next() => log_join(joined),
                    _ = shutdown_requested(&mut shutdown_rx) => break 'serve,
                }
            };

            let (stream, peer) = tokio::select! {
                accepted = P::accept(&listener) => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                        continue;
                    }
                },
                _ = shutdown_requested(&mut shutdown_rx) => break 'serve,
            };

            let active = limiter.metrics().active;
            info!(%peer, active, "Accepted connection");

            let span = tracing::info_span!("connection", %peer);
            handlers.spawn(Self::handle_connection(ctx.clone(), stream, peer, guard).instrument(span));
        }

        // Stop accepting before draining so new connections are refused
        drop(listener);
        limiter.close();
        drain_handlers(&mut handlers, &cancel, self.config.shutdown_grace).await;
        self.signals.set_listening(None);

        let metrics = limiter.metrics();
        info!(handled = metrics.total, "Stream ack server stopped");
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
