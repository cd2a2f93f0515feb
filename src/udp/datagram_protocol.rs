use crate::datagram::DatagramProtocol;
use crate::{AckError, Result};
use std::net::SocketAddr;
use tokio::net::UdpSocket;

/// UDP protocol implementation
pub struct UdpProtocol;

impl DatagramProtocol for UdpProtocol {
    type Socket = UdpSocket;

    fn bind(addr: SocketAddr) -> impl std::future::Future<Output = Result<UdpSocket>> + Send {
        async move {
            UdpSocket::bind(addr)
                .await
                .map_err(|e| AckError::Config(format!("Failed to bind UDP socket to {addr}: {e}")))
        }
    }

    fn local_addr(socket: &UdpSocket) -> Result<SocketAddr> {
        socket.local_addr().map_err(AckError::Udp)
    }

    fn recv_from(
        socket: &UdpSocket,
        buffer: &mut [u8],
    ) -> impl std::future::Future<Output = Result<(usize, SocketAddr)>> + Send {
        async move { socket.recv_from(buffer).await.map_err(AckError::Udp) }
    }

    fn send_to(
        socket: &UdpSocket,
        data: &[u8],
        addr: SocketAddr,
    ) -> impl std::future::Future<Output = Result<usize>> + Send {
        async move { socket.send_to(data, addr).await.map_err(AckError::Udp) }
    }
}
