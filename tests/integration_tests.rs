use acksrv::common::{AckServer, ExchangeClient, Receipt, spawn_server};
use acksrv::datagram::{DatagramClientConfig, DatagramServerConfig};
use acksrv::network::Endpoint;
use acksrv::stream::{StreamClientConfig, StreamServerConfig};
use acksrv::{TcpAckServer, TcpClient, UdpAckServer, UdpClient};
use color_eyre::eyre::{Result, eyre};
use std::time::Duration;
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

fn udp_config() -> DatagramServerConfig {
    DatagramServerConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        ..Default::default()
    }
}

fn tcp_config() -> StreamServerConfig {
    StreamServerConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        ..Default::default()
    }
}

async fn next_receipt(receipts: &mut mpsc::Receiver<Receipt>) -> Result<Receipt> {
    receipts
        .recv()
        .await
        .ok_or_else(|| eyre!("Receipt feed closed"))
}

#[tokio::test]
async fn test_udp_exchange_records_exactly_one_receipt() -> Result<()> {
    let mut running = spawn_server(UdpAckServer::new(udp_config())).await?;

    let mut client = UdpClient::connect(&running.addr.into(), DatagramClientConfig::default()).await?;
    let client_port = client.local_addr()?.port();
    assert_eq!(client.exchange_string("ABCDEF").await?, "ACK");

    let receipt = next_receipt(&mut running.receipts).await?;
    assert_eq!(receipt.peer.port(), client_port);
    assert_eq!(receipt.payload, "ABCDEF");
    assert!(receipt.to_string().ends_with(": ABCDEF"));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(matches!(running.receipts.try_recv(), Err(TryRecvError::Empty)));

    running.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_concurrent_datagrams_beyond_handler_limit() -> Result<()> {
    let config = DatagramServerConfig {
        max_in_flight: 2,
        ..udp_config()
    };
    let mut running = spawn_server(UdpAckServer::new(config)).await?;
    let endpoint = Endpoint::from(running.addr);

    let client_count = 20;
    let mut handles = Vec::new();
    for i in 0..client_count {
        let endpoint = endpoint.clone();
        handles.push(tokio::spawn(async move {
            let mut client = UdpClient::connect(&endpoint, DatagramClientConfig::default()).await?;
            client.exchange_string(&format!("datagram {i}")).await
        }));
    }

    for handle in handles {
        assert_eq!(handle.await??, "ACK");
    }

    let mut payloads = Vec::new();
    for _ in 0..client_count {
        payloads.push(next_receipt(&mut running.receipts).await?.payload);
    }
    payloads.sort();
    let mut expected: Vec<String> = (0..client_count).map(|i| format!("datagram {i}")).collect();
    expected.sort();
    assert_eq!(payloads, expected);

    running.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_independent_client_runs() -> Result<()> {
    let running = spawn_server(UdpAckServer::new(udp_config())).await?;

    for _ in 0..3 {
        let mut client = UdpClient::connect(&running.addr.into(), DatagramClientConfig::default()).await?;
        assert_eq!(client.exchange_string("ABCDEF").await?, "ACK");
        drop(client);
    }

    running.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_udp_shutdown_releases_port() -> Result<()> {
    let running = spawn_server(UdpAckServer::new(udp_config())).await?;
    let addr = running.addr;

    running.stop().await?;

    let rebound = UdpSocket::bind(addr).await?;
    assert_eq!(rebound.local_addr()?, addr);
    Ok(())
}

#[tokio::test]
async fn test_tcp_client_against_ack_server() -> Result<()> {
    let mut running = spawn_server(TcpAckServer::new(tcp_config())).await?;

    let message = "Long Live Falcone & Borsellino!\r\n";
    let mut client = TcpClient::connect(&running.addr.into(), StreamClientConfig::default()).await?;
    assert_eq!(client.exchange_string(message).await?, "ACK");

    let receipt = next_receipt(&mut running.receipts).await?;
    assert_eq!(receipt.payload, message);

    running.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_tcp_connections_beyond_limit_are_queued() -> Result<()> {
    let config = StreamServerConfig {
        max_connections: 2,
        backlog: 32,
        ..tcp_config()
    };
    let running = spawn_server(TcpAckServer::new(config)).await?;
    let endpoint = Endpoint::from(running.addr);

    let mut handles = Vec::new();
    for i in 0..10 {
        let endpoint = endpoint.clone();
        handles.push(tokio::spawn(async move {
            let mut client = TcpClient::connect(&endpoint, StreamClientConfig::default()).await?;
            client.exchange_string(&format!("client {i}")).await
        }));
    }

    for handle in handles {
        assert_eq!(handle.await??, "ACK");
    }

    running.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_tcp_shutdown_cancels_idle_connection() -> Result<()> {
    let config = StreamServerConfig {
        read_timeout: Duration::from_secs(30),
        shutdown_grace: Duration::from_millis(200),
        ..tcp_config()
    };
    let running = spawn_server(TcpAckServer::new(config)).await?;
    let addr = running.addr;

    // Connect and stay silent so the handler sits in its read
    let _idle = TcpStream::connect(addr).await?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    tokio::time::timeout(Duration::from_secs(3), running.stop()).await??;

    assert!(TcpStream::connect(addr).await.is_err());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stop_right_after_listening_is_never_lost() -> Result<()> {
    for _ in 0..200 {
        let udp = spawn_server(UdpAckServer::new(udp_config())).await?;
        tokio::time::timeout(Duration::from_secs(2), udp.stop()).await??;

        let tcp = spawn_server(TcpAckServer::new(tcp_config())).await?;
        tokio::time::timeout(Duration::from_secs(2), tcp.stop()).await??;
    }
    Ok(())
}

#[tokio::test]
async fn test_shutdown_signal_after_listening_stops_server() -> Result<()> {
    let server = UdpAckServer::new(udp_config());
    let shutdown = server.shutdown_signal();
    let mut listening = server.listening();
    let handle = tokio::spawn(async move { server.run().await });

    listening.wait_for(|addr| addr.is_some()).await?;
    shutdown.send(())?;

    tokio::time::timeout(Duration::from_secs(2), handle).await???;
    Ok(())
}

#[tokio::test]
async fn test_slow_receipt_consumer_sees_every_datagram() -> Result<()> {
    let mut running = spawn_server(UdpAckServer::new(udp_config())).await?;
    let endpoint = Endpoint::from(running.addr);
    let total = 400;

    // More datagrams than the receipt feed holds, sent one after another
    let sender = tokio::spawn(async move {
        let mut client = UdpClient::connect(&endpoint, DatagramClientConfig::default()).await?;
        let mut acks = 0;
        for i in 0..total {
            if client.exchange_string(&format!("datagram {i}")).await? == "ACK" {
                acks += 1;
            }
        }
        Ok::<_, acksrv::AckError>(acks)
    });

    // Fall far behind before draining; handlers wait instead of dropping
    tokio::time::sleep(Duration::from_millis(500)).await;
    let mut seen = Vec::new();
    while seen.len() < total {
        seen.push(next_receipt(&mut running.receipts).await?.payload);
    }

    assert_eq!(sender.await??, total);
    let expected: Vec<String> = (0..total).map(|i| format!("datagram {i}")).collect();
    assert_eq!(seen, expected);
    assert!(matches!(running.receipts.try_recv(), Err(TryRecvError::Empty)));

    running.stop().await?;
    Ok(())
}
