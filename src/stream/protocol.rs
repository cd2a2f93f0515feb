use crate::Result;
use std::future::Future;
use std::net::SocketAddr;

/// Trait for stream-based protocols
///
/// This trait defines the interface that stream protocol implementations
/// must provide to work with the generic stream ack server and client.
pub trait StreamProtocol {
    /// Listener type for this protocol
    type Listener: Send + Sync + 'static;
    /// Stream type for this protocol
    type Stream: Send + 'static;

    /// Binds a listener with the given backlog (server-side)
    fn bind(addr: SocketAddr, backlog: u32) -> impl Future<Output = Result<Self::Listener>> + Send;

    /// Returns the address the listener is bound to
    fn local_addr(listener: &Self::Listener) -> Result<SocketAddr>;

    /// Accepts a new connection from the listener (server-side)
    fn accept(
        listener: &Self::Listener,
    ) -> impl Future<Output = Result<(Self::Stream, SocketAddr)>> + Send;

    /// Connects to a server at the given address (client-side)
    fn connect(addr: SocketAddr) -> impl Future<Output = Result<Self::Stream>> + Send;

    /// Reads data from a stream
    fn read(
        stream: &mut Self::Stream,
        buffer: &mut [u8],
    ) -> impl Future<Output = Result<usize>> + Send;

    /// Writes all of `data` to a stream
    fn write(stream: &mut Self::Stream, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Flushes a stream
    fn flush(stream: &mut Self::Stream) -> impl Future<Output = Result<()>> + Send;

    /// Shuts down the write half of a stream
    fn shutdown(stream: &mut Self::Stream) -> impl Future<Output = Result<()>> + Send;
}
