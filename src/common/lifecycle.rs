//! Shutdown and observation plumbing shared by the ack servers

use super::Receipt;
use std::net::SocketAddr;
use crate::{AckError, Result};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::signal;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::{JoinError, JoinSet};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const FEED_CAPACITY: usize = 256;

/// Single-consumer event stream that never drops events
///
/// Senders wait while the consumer is behind. If nobody claimed the
/// receiver by the time the server starts, it is dropped and sends become
/// no-ops.
pub(crate) struct Feed<T> {
    tx: mpsc::Sender<T>,
    rx: Mutex<Option<mpsc::Receiver<T>>>,
}

impl<T> Feed<T> {
    pub(crate) fn new() -> Self {
        let (tx, rx) = mpsc::channel(FEED_CAPACITY);
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
        }
    }

    pub(crate) fn sender(&self) -> mpsc::Sender<T> {
        self.tx.clone()
    }

    /// Hands out the receiver; only the first call gets it
    pub(crate) fn take(&self) -> Option<mpsc::Receiver<T>> {
        self.rx.lock().ok()?.take()
    }

    pub(crate) fn release_unclaimed(&self) {
        drop(self.take());
    }
}

/// Channels every ack server exposes to its owner
pub(crate) struct ServerSignals {
    shutdown: Arc<broadcast::Sender<()>>,
    receipts: Feed<Receipt>,
    listening: watch::Sender<Option<SocketAddr>>,
}

impl ServerSignals {
    pub(crate) fn new() -> Self {
        let (shutdown, _) = broadcast::channel(1);
        let (listening, _) = watch::channel(None);
        Self {
            shutdown: Arc::new(shutdown),
            receipts: Feed::new(),
            listening,
        }
    }

    pub(crate) fn shutdown_sender(&self) -> broadcast::Sender<()> {
        self.shutdown.as_ref().clone()
    }

    pub(crate) fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown.subscribe()
    }

    pub(crate) fn receipt_sender(&self) -> mpsc::Sender<Receipt> {
        self.receipts.sender()
    }

    pub(crate) fn take_receipts(&self) -> Option<mpsc::Receiver<Receipt>> {
        self.receipts.take()
    }

    pub(crate) fn release_unclaimed_receipts(&self) {
        self.receipts.release_unclaimed();
    }

    pub(crate) fn watch_listening(&self) -> watch::Receiver<Option<SocketAddr>> {
        self.listening.subscribe()
    }

    pub(crate) fn set_listening(&self, addr: Option<SocketAddr>) {
        self.listening.send_replace(addr);
    }
}

/// Resolves once Ctrl-C is pressed or the internal shutdown signal fires
pub(crate) async fn shutdown_requested(shutdown_rx: &mut broadcast::Receiver<()>) {
    tokio::select! {
        Ok(()) = signal::ctrl_c() => {
            info!("Received shutdown signal, stopping server");
        }
        _ = shutdown_rx.recv() => {
            info!("Received internal shutdown signal, stopping server");
        }
    }
}

/// Delivers `event` to the feed consumer, waiting while it is behind
///
/// A missing consumer is not an error; cancellation is.
pub(crate) async fn publish<T>(
    feed: &mpsc::Sender<T>,
    event: T,
    cancel: &CancellationToken,
) -> Result<()> {
    tokio::select! {
        // Err means nobody consumes the feed
        _ = feed.send(event) => Ok(()),
        _ = cancel.cancelled() => Err(AckError::Shutdown),
    }
}

pub(crate) fn log_join(joined: std::result::Result<(), JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            error!(error = %e, "Handler panicked");
        }
    }
}

/// Waits for in-flight handlers, cancelling them once `grace` runs out
pub(crate) async fn drain_handlers(
    handlers: &mut JoinSet<()>,
    cancel: &CancellationToken,
    grace: Duration,
) {
    if handlers.is_empty() {
        return;
    }

    info!(in_flight = handlers.len(), "Waiting for in-flight handlers");
    let finished = timeout(grace, async {
        while let Some(joined) = handlers.join_next().await {
            log_join(joined);
        }
    })
    .await;
    if finished.is_ok() {
        return;
    }

    warn!(in_flight = handlers.len(), "Shutdown grace period elapsed, cancelling handlers");
    cancel.cancel();
    let cancelled = timeout(grace, async {
        while let Some(joined) = handlers.join_next().await {
            log_join(joined);
        }
    })
    .await;
    if cancelled.is_err() {
        warn!(in_flight = handlers.len(), "Aborting handlers that ignored cancellation");
        handlers.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_feed_receiver_is_handed_out_once() {
        let feed: Feed<u32> = Feed::new();
        assert!(feed.take().is_some());
        assert!(feed.take().is_none());
    }

    #[tokio::test]
    async fn test_publish_without_consumer_does_not_wait() {
        let feed: Feed<u32> = Feed::new();
        feed.release_unclaimed();
        let tx = feed.sender();
        let cancel = CancellationToken::new();

        for i in 0..(FEED_CAPACITY as u32 * 2) {
            timeout(Duration::from_millis(100), publish(&tx, i, &cancel))
                .await
                .expect("publish should not block")
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_publish_waits_for_consumer_until_cancelled() {
        let feed: Feed<u32> = Feed::new();
        let mut rx = feed.take().unwrap();
        let tx = feed.sender();
        let cancel = CancellationToken::new();

        for i in 0..FEED_CAPACITY as u32 {
            publish(&tx, i, &cancel).await.unwrap();
        }
        assert!(timeout(Duration::from_millis(50), publish(&tx, 999, &cancel)).await.is_err());

        cancel.cancel();
        assert!(matches!(publish(&tx, 999, &cancel).await, Err(AckError::Shutdown)));
        assert_eq!(rx.recv().await, Some(0));
    }

    #[tokio::test]
    async fn test_drain_aborts_handlers_that_ignore_cancellation() {
        let mut handlers = JoinSet::new();
        handlers.spawn(async {
            tokio::time::sleep(Duration::from_secs(30)).await;
        });
        let cancel = CancellationToken::new();

        let started = Instant::now();
        drain_handlers(&mut handlers, &cancel, Duration::from_millis(100)).await;

        assert!(cancel.is_cancelled());
        assert!(handlers.is_empty());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_drain_returns_once_handlers_finish() {
        let mut handlers = JoinSet::new();
        handlers.spawn(async {
            tokio::time::sleep(Duration::from_millis(20)).await;
        });
        let cancel = CancellationToken::new();

        drain_handlers(&mut handlers, &cancel, Duration::from_secs(5)).await;
        assert!(!cancel.is_cancelled());
        assert!(handlers.is_empty());
    }
}
