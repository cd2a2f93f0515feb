use crate::Result;
use std::future::Future;
use std::net::SocketAddr;

/// Trait for datagram-based protocols
///
/// This trait defines the socket operations the generic datagram server
/// and client are built on.
pub trait DatagramProtocol {
    /// Socket type for this protocol; shared between handler tasks
    type Socket: Send + Sync + 'static;

    /// Binds a socket to the given address
    fn bind(addr: SocketAddr) -> impl Future<Output = Result<Self::Socket>> + Send;

    /// Returns the address the socket is bound to
    fn local_addr(socket: &Self::Socket) -> Result<SocketAddr>;

    /// Receives one datagram
    fn recv_from(
        socket: &Self::Socket,
        buffer: &mut [u8],
    ) -> impl Future<Output = Result<(usize, SocketAddr)>> + Send;

    /// Sends one datagram to a specific address
    fn send_to(
        socket: &Self::Socket,
        data: &[u8],
        addr: SocketAddr,
    ) -> impl Future<Output = Result<usize>> + Send;
}
