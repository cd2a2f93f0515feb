use acksrv::common::{AckServer, Decoding, ExchangeClient};
use acksrv::datagram::{DatagramClientConfigBuilder, DatagramServerConfig};
use acksrv::network::Endpoint;
use acksrv::stream::{StreamClientConfigBuilder, StreamServerConfig};
use acksrv::{TcpAckServer, TcpClient, UdpAckServer, UdpClient};
use bytes::Bytes;
use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "acksrv", version, about = "One-shot TCP/UDP clients and acknowledgement servers")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send one payload over TCP and print the reply
    TcpClient {
        #[arg(long, default_value = "localhost:4444")]
        target: Endpoint,
        #[arg(long, default_value = "ABCDE")]
        payload: String,
        #[command(flatten)]
        client: ClientArgs,
    },
    /// Send one datagram over UDP and print the reply
    UdpClient {
        #[arg(long, default_value = "127.0.0.1:4444")]
        target: Endpoint,
        #[arg(long, default_value = "ABCDEF")]
        payload: String,
        #[command(flatten)]
        client: ClientArgs,
    },
    /// Acknowledge every datagram received
    UdpServer {
        #[arg(long, default_value = "127.0.0.1:4444")]
        bind: SocketAddr,
        #[arg(long, default_value_t = 64)]
        max_in_flight: usize,
        #[arg(long, default_value_t = 4096)]
        buffer_size: usize,
        #[command(flatten)]
        server: ServerArgs,
    },
    /// Acknowledge the first message on every TCP connection
    TcpServer {
        #[arg(long, default_value = "0.0.0.0:4444")]
        bind: SocketAddr,
        #[arg(long, default_value_t = 64)]
        max_connections: usize,
        #[arg(long, default_value_t = 1024)]
        buffer_size: usize,
        #[arg(long, default_value_t = 5)]
        backlog: u32,
        #[command(flatten)]
        server: ServerArgs,
    },
}

#[derive(Args, Debug)]
struct ClientArgs {
    /// Largest reply read
    #[arg(long, default_value_t = 4096)]
    buffer_size: usize,
    /// Deadline for the reply, in milliseconds
    #[arg(long, default_value_t = 30_000)]
    timeout_ms: u64,
}

#[derive(Args, Debug)]
struct ServerArgs {
    /// Bytes sent back for every message
    #[arg(long, default_value = "ACK")]
    reply: String,
    /// Replace invalid UTF-8 instead of dropping the message
    #[arg(long)]
    lossy: bool,
}

impl ServerArgs {
    fn decoding(&self, default: Decoding) -> Decoding {
        if self.lossy { Decoding::Lossy } else { default }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Logs go to stderr; stdout carries only program output
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("acksrv=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::TcpClient {
            target,
            payload,
            client,
        } => {
            let config = StreamClientConfigBuilder::new()
                .buffer_size(client.buffer_size)
                .read_timeout(Duration::from_millis(client.timeout_ms))
                .build();
            let tcp = TcpClient::connect(&target, config)
                .await
                .wrap_err_with(|| format!("Failed to connect to {target}"))?;
            exchange_once(Box::new(tcp), &payload).await?;
        }
        Command::UdpClient {
            target,
            payload,
            client,
        } => {
            let config = DatagramClientConfigBuilder::new()
                .buffer_size(client.buffer_size)
                .read_timeout(Duration::from_millis(client.timeout_ms))
                .build();
            let udp = UdpClient::connect(&target, config)
                .await
                .wrap_err_with(|| format!("Failed to prepare UDP client for {target}"))?;
            exchange_once(Box::new(udp), &payload).await?;
        }
        Command::UdpServer {
            bind,
            max_in_flight,
            buffer_size,
            server,
        } => {
            let config = DatagramServerConfig {
                bind_addr: bind,
                max_in_flight,
                buffer_size,
                decoding: server.decoding(Decoding::Strict),
                reply: Bytes::from(server.reply),
                ..Default::default()
            };
            info!(address = %config.bind_addr, max_in_flight, "Starting UDP ack server");
            serve(UdpAckServer::new(config), None)
                .await
                .wrap_err("Failed to run UDP ack server")?;
        }
        Command::TcpServer {
            bind,
            max_connections,
            buffer_size,
            backlog,
            server,
        } => {
            let config = StreamServerConfig {
                bind_addr: bind,
                max_connections,
                buffer_size,
                backlog,
                decoding: server.decoding(Decoding::Lossy),
                reply: Bytes::from(server.reply),
                ..Default::default()
            };
            info!(address = %config.bind_addr, max_connections, "Starting TCP ack server");
            let server = TcpAckServer::new(config);
            let accepted = server.connections();
            serve(server, accepted)
                .await
                .wrap_err("Failed to run TCP ack server")?;
        }
    }

    Ok(())
}

async fn exchange_once(mut client: Box<dyn ExchangeClient>, payload: &str) -> Result<()> {
    let reply = client
        .exchange_string(payload)
        .await
        .wrap_err("Exchange failed")?;
    println!("{reply}");
    Ok(())
}

/// Runs `server`, printing the listening line, accepted peers and every
/// receipt to stdout
async fn serve<S>(server: S, mut accepted: Option<mpsc::Receiver<SocketAddr>>) -> acksrv::Result<()>
where
    S: AckServer + Send + Sync + 'static,
{
    let mut listening = server.listening();
    let mut receipts = server
        .receipts()
        .ok_or_else(|| acksrv::AckError::Config("Receipts were already taken".to_string()))?;

    let printer = tokio::spawn(async move {
        let bound = listening
            .wait_for(|addr| addr.is_some())
            .await
            .map(|addr| *addr);
        if let Ok(Some(addr)) = bound {
            println!("[*] Listening on {addr} ...");
        }
        loop {
            tokio::select! {
                biased;
                Some(peer) = next_accepted(&mut accepted) => {
                    println!("[*] Accepted connection from {peer}");
                }
                receipt = receipts.recv() => match receipt {
                    Some(receipt) => println!("{receipt}"),
                    None => break,
                },
            }
        }
    });

    let result = server.run().await;
    // Dropping the server closes the feeds once everything queued is printed
    drop(server);
    if let Err(e) = printer.await {
        tracing::error!(error = %e, "Printer task failed");
    }
    result
}

async fn next_accepted(accepted: &mut Option<mpsc::Receiver<SocketAddr>>) -> Option<SocketAddr> {
    match accepted {
        Some(rx) => rx.recv().await,
        None => None,
    }
}
