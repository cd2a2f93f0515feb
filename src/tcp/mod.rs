pub mod stream_protocol;

pub use stream_protocol::TcpProtocol;

/// Stream ack server over TCP
pub type TcpAckServer = crate::stream::StreamAckServer<TcpProtocol>;

/// One-shot stream client over TCP
pub type TcpClient = crate::stream::StreamClient<TcpProtocol>;
