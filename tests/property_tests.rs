use acksrv::common::{ExchangeClient, spawn_server};
use acksrv::datagram::{DatagramClientConfig, DatagramServerConfig};
use acksrv::network::Endpoint;
use acksrv::stream::{StreamClientConfig, StreamServerConfig};
use acksrv::{TcpAckServer, TcpClient, UdpAckServer, UdpClient};
use proptest::prelude::*;

fn udp_config() -> DatagramServerConfig {
    DatagramServerConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        ..Default::default()
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(25))]

    /// Property: every UTF-8 datagram is acknowledged and recorded verbatim
    #[test]
    fn udp_receipt_preserves_payload(text in ".{0,64}") {
        tokio_test::block_on(async {
            let mut running = spawn_server(UdpAckServer::new(udp_config())).await
                .map_err(|e| TestCaseError::fail(format!("Server setup failed: {}", e)))?;

            let mut client = UdpClient::connect(&running.addr.into(), DatagramClientConfig::default()).await
                .map_err(|e| TestCaseError::fail(format!("Client setup failed: {}", e)))?;
            let reply = client.exchange_string(&text).await
                .map_err(|e| TestCaseError::fail(format!("Exchange failed: {}", e)))?;
            let receipt = running.receipts.recv().await
                .ok_or_else(|| TestCaseError::fail("No receipt"))?;

            running.stop().await
                .map_err(|e| TestCaseError::fail(format!("Shutdown failed: {}", e)))?;

            prop_assert_eq!(reply, "ACK");
            prop_assert_eq!(receipt.payload, text);
            Ok(())
        })?;
    }

    /// Property: N concurrent datagrams yield N acknowledgements
    #[test]
    fn concurrent_datagrams_all_acknowledged(
        messages in prop::collection::vec("[a-zA-Z0-9 ]{1,32}", 1..12),
        max_in_flight in 1usize..4,
    ) {
        tokio_test::block_on(async {
            let config = DatagramServerConfig { max_in_flight, ..udp_config() };
            let running = spawn_server(UdpAckServer::new(config)).await
                .map_err(|e| TestCaseError::fail(format!("Server setup failed: {}", e)))?;
            let endpoint = Endpoint::from(running.addr);

            let mut handles = Vec::new();
            for message in messages.iter().cloned() {
                let endpoint = endpoint.clone();
                handles.push(tokio::spawn(async move {
                    let mut client = UdpClient::connect(&endpoint, DatagramClientConfig::default()).await?;
                    client.exchange_string(&message).await
                }));
            }

            let mut acks = 0;
            for handle in handles {
                let reply = handle.await
                    .map_err(|e| TestCaseError::fail(format!("Task failed: {}", e)))?
                    .map_err(|e| TestCaseError::fail(format!("Exchange failed: {}", e)))?;
                prop_assert_eq!(reply, "ACK");
                acks += 1;
            }

            running.stop().await
                .map_err(|e| TestCaseError::fail(format!("Shutdown failed: {}", e)))?;

            prop_assert_eq!(acks, messages.len());
            Ok(())
        })?;
    }

    /// Property: the TCP ack server replies the same way regardless of payload
    #[test]
    fn tcp_reply_independent_of_payload(data in prop::collection::vec(any::<u8>(), 1..512)) {
        tokio_test::block_on(async {
            let config = StreamServerConfig {
                bind_addr: "127.0.0.1:0".parse().unwrap(),
                ..Default::default()
            };
            let running = spawn_server(TcpAckServer::new(config)).await
                .map_err(|e| TestCaseError::fail(format!("Server setup failed: {}", e)))?;

            let mut client = TcpClient::connect(&running.addr.into(), StreamClientConfig::default()).await
                .map_err(|e| TestCaseError::fail(format!("Client connection failed: {}", e)))?;
            let reply = client.exchange(&data).await
                .map_err(|e| TestCaseError::fail(format!("Exchange failed: {}", e)))?;

            running.stop().await
                .map_err(|e| TestCaseError::fail(format!("Shutdown failed: {}", e)))?;

            prop_assert_eq!(reply, b"ACK".to_vec());
            Ok(())
        })?;
    }
}
