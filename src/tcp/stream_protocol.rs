use crate::stream::StreamProtocol;
use crate::{AckError, Result};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket, TcpStream};

/// TCP protocol implementation
pub struct TcpProtocol;

fn listen(addr: SocketAddr, backlog: u32) -> std::io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    #[cfg(unix)]
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(backlog)
}

impl StreamProtocol for TcpProtocol {
    type Listener = TcpListener;
    type Stream = TcpStream;

    fn bind(
        addr: SocketAddr,
        backlog: u32,
    ) -> impl std::future::Future<Output = Result<TcpListener>> + Send {
        async move {
            listen(addr, backlog).map_err(|e| {
                AckError::Config(format!("Failed to bind TCP listener to {addr}: {e}"))
            })
        }
    }

    fn local_addr(listener: &TcpListener) -> Result<SocketAddr> {
        listener.local_addr().map_err(AckError::Tcp)
    }

    fn accept(
        listener: &TcpListener,
    ) -> impl std::future::Future<Output = Result<(TcpStream, SocketAddr)>> + Send {
        async move { listener.accept().await.map_err(AckError::Tcp) }
    }

    fn connect(addr: SocketAddr) -> impl std::future::Future<Output = Result<TcpStream>> + Send {
        async move { TcpStream::connect(addr).await.map_err(AckError::Tcp) }
    }

    fn read(
        stream: &mut TcpStream,
        buffer: &mut [u8],
    ) -> impl std::future::Future<Output = Result<usize>> + Send {
        async move { stream.read(buffer).await.map_err(AckError::Tcp) }
    }

    fn write(
        stream: &mut TcpStream,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send {
        async move { stream.write_all(data).await.map_err(AckError::Tcp) }
    }

    fn flush(stream: &mut TcpStream) -> impl std::future::Future<Output = Result<()>> + Send {
        async move { stream.flush().await.map_err(AckError::Tcp) }
    }

    fn shutdown(stream: &mut TcpStream) -> impl std::future::Future<Output = Result<()>> + Send {
        async move { stream.shutdown().await.map_err(AckError::Tcp) }
    }
}
