//! TCP plumbing for the two device channels.

use std::fmt;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::command::Channel;
use crate::error::MixBoardError;

pub const DEFAULT_COMMAND_PORT: u16 = 701;
pub const DEFAULT_EVENT_PORT: u16 = 801;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const READ_BUFFER_SIZE: usize = 4096;

/// Which of the two device connections
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum Port {
    Command,
    Event,
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Port::Command => f.write_str("command"),
            Port::Event => f.write_str("event"),
        }
    }
}

/// Connectivity of one channel
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Ok,
    /// Connection attempt failed
    Failed(String),
    /// Peer closed the connection or it broke mid-session
    Disconnected(Option<String>),
}

/// Where and how to reach the device
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub event_port: u16,
    /// Channel selected when the session starts
    pub channel: Channel,
    /// Log every raw inbound chunk
    pub protocol_log: bool,
    /// Pause between command-channel connect and the initial refresh queries
    pub initial_query_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_COMMAND_PORT,
            event_port: DEFAULT_EVENT_PORT,
            channel: Channel::default(),
            protocol_log: false,
            initial_query_delay: Duration::from_millis(50),
        }
    }
}

impl SessionConfig {
    pub fn address(&self, port: Port) -> (String, u16) {
        match port {
            Port::Command => (self.host.clone(), self.port),
            Port::Event => (self.host.clone(), self.event_port),
        }
    }
}

/// Traffic from reader tasks to the session actor
#[derive(Debug)]
pub(crate) enum Inbound {
    Data {
        port: Port,
        generation: u64,
        data: Vec<u8>,
    },
    Closed {
        port: Port,
        generation: u64,
        error: Option<String>,
    },
    /// Fire the initial refresh queries for this connection generation
    InitialQueries { generation: u64 },
}

/// Open one channel.
pub(crate) async fn open(
    config: &SessionConfig,
    port: Port,
) -> Result<(OwnedReadHalf, OwnedWriteHalf), MixBoardError> {
    let (host, number) = config.address(port);
    info!("Connecting {} channel to {}:{}", port, host, number);

    let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect((host.as_str(), number)))
        .await
        .map_err(|_| MixBoardError::Io {
            port,
            source: std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out"),
        })?
        .map_err(|source| MixBoardError::Io { port, source })?;

    if let Err(e) = stream.set_nodelay(true) {
        debug!("Could not set TCP_NODELAY on {} channel: {}", port, e);
    }

    Ok(stream.into_split())
}

/// Forward raw chunks from one connection to the actor until it closes.
pub(crate) async fn read_loop(
    port: Port,
    generation: u64,
    mut reader: OwnedReadHalf,
    tx: mpsc::Sender<Inbound>,
) {
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    let error = loop {
        match reader.read(&mut buffer).await {
            Ok(0) => {
                info!("{} channel closed by peer", port);
                break None;
            }
            Ok(n) => {
                let inbound = Inbound::Data {
                    port,
                    generation,
                    data: buffer[..n].to_vec(),
                };
                if tx.send(inbound).await.is_err() {
                    // Actor is gone
                    return;
                }
            }
            Err(e) => {
                warn!("Error reading {} channel: {}", port, e);
                break Some(e.to_string());
            }
        }
    };

    let _ = tx
        .send(Inbound::Closed {
            port,
            generation,
            error,
        })
        .await;
}
