use crate::common::{AckServer, Receipt};
use crate::{AckError, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// A server spawned onto the runtime for integration tests
pub struct RunningServer {
    /// Address the server actually bound
    pub addr: SocketAddr,
    /// Receipts published by the server, claimed before it started
    pub receipts: mpsc::Receiver<Receipt>,
    shutdown: broadcast::Sender<()>,
    handle: JoinHandle<Result<()>>,
}

impl RunningServer {
    /// Consumes receipts in the background so long runs never stall on them
    ///
    /// Must be called from within a Tokio runtime.
    pub fn discard_receipts(&mut self) {
        let (_, closed) = mpsc::channel(1);
        let mut receipts = std::mem::replace(&mut self.receipts, closed);
        tokio::spawn(async move { while receipts.recv().await.is_some() {} });
    }

    /// Requests a graceful shutdown and waits for `run` to return
    pub async fn stop(self) -> Result<()> {
        let _ = self.shutdown.send(());
        self.handle
            .await
            .map_err(|e| AckError::Config(format!("Server task failed: {e}")))?
    }
}

/// Spawns `server` and waits until it reports its bound address
///
/// Configure the server with port 0 so concurrent tests never collide.
pub async fn spawn_server<S>(server: S) -> Result<RunningServer>
where
    S: AckServer + Send + Sync + 'static,
{
    let mut listening = server.listening();
    let receipts = server
        .receipts()
        .ok_or_else(|| AckError::Config("Receipts were already taken".to_string()))?;
    let shutdown = server.shutdown_signal();
    let handle = tokio::spawn(async move { server.run().await });

    let bound = timeout(Duration::from_secs(5), async {
        listening
            .wait_for(|addr| addr.is_some())
            .await
            .map(|addr| *addr)
    })
    .await;

    match bound {
        Ok(Ok(Some(addr))) => Ok(RunningServer {
            addr,
            receipts,
            shutdown,
            handle,
        }),
        Ok(_) => match handle.await {
            Ok(Err(e)) => Err(e),
            Ok(Ok(())) => Err(AckError::Config(
                "Server stopped before listening".to_string(),
            )),
            Err(e) => Err(AckError::Config(format!("Server task failed: {e}"))),
        },
        Err(_) => {
            handle.abort();
            Err(AckError::Timeout(
                "Server did not start listening within 5s".to_string(),
            ))
        }
    }
}
