pub mod datagram_protocol;

pub use datagram_protocol::UdpProtocol;

/// Datagram ack server over UDP
pub type UdpAckServer = crate::datagram::DatagramAckServer<UdpProtocol>;

/// One-shot datagram client over UDP
pub type UdpClient = crate::datagram::DatagramClient<UdpProtocol>;
