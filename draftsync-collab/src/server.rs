//! WebSocket relay server.
//!
//! ```text
//! Client A ──┐                         ┌──► Client B
//!            ├── socket task ─► Relay ─┤
//! Client C ──┘                         └──► Client C
//! ```
//!
//! One task per socket forwards inbound frames to the relay loop and writes
//! whatever the relay queues for it.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::identity::ConnectionId;
use crate::protocol::ProtocolError;
use crate::relay::{self, ConnectionEvent, ConnectionPhase, Relay, RelayCommand, RelayHandle};

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: String,
    /// Relay command queue capacity
    pub command_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3001".to_string(),
            command_buffer: 256,
        }
    }
}

/// Server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// The relay server.
pub struct RelayServer {
    config: ServerConfig,
    handle: RelayHandle,
    commands: mpsc::Receiver<RelayCommand>,
}

impl RelayServer {
    pub fn new(config: ServerConfig) -> Self {
        let (tx, commands) = mpsc::channel(config.command_buffer.max(1));
        Self {
            config,
            handle: RelayHandle::new(tx),
            commands,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(ServerConfig::default())
    }

    pub fn bind_addr(&self) -> &str {
        &self.config.bind_addr
    }

    /// Handle to the relay loop this server will drive.
    pub fn handle(&self) -> RelayHandle {
        self.handle.clone()
    }

    /// Bind the configured address and serve until the listener fails.
    pub async fn run(self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        log::info!("Relay listening on ws://{}", listener.local_addr()?);
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<(), ServerError> {
        let Self {
            handle, commands, ..
        } = self;
        tokio::spawn(relay::run(Relay::new(), commands));

        loop {
            let (stream, addr) = listener.accept().await?;
            log::debug!("New TCP connection from {addr}");

            let handle = handle.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, addr, handle).await {
                    log::error!("Connection error from {addr}: {e}");
                }
            });
        }
    }
}

/// Drive one WebSocket connection from accept to close.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    relay: RelayHandle,
) -> Result<(), ServerError> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let mut phase = ConnectionPhase::Connecting;

    let (outbound, outbound_rx) = mpsc::unbounded_channel();
    let id = relay.accept(outbound).await?;
    phase = phase.on(ConnectionEvent::Accepted);
    log::info!("WebSocket connection {id} established from {addr}");

    let result = pump(ws_stream, id, &relay, outbound_rx, &mut phase).await;

    phase = phase.on(ConnectionEvent::TransportClosed);
    log::debug!("Connection {id} is {phase:?}");
    relay.close(id).await?;
    result
}

async fn pump(
    ws_stream: tokio_tungstenite::WebSocketStream<TcpStream>,
    id: ConnectionId,
    relay: &RelayHandle,
    mut outbound_rx: mpsc::UnboundedReceiver<Arc<str>>,
    phase: &mut ConnectionPhase,
) -> Result<(), ServerError> {
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    while phase.is_open() {
        tokio::select! {
            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        *phase = phase.on(ConnectionEvent::Message);
                        relay.inbound(id, text.as_str().to_owned()).await?;
                    }
                    Some(Ok(Message::Binary(data))) => {
                        *phase = phase.on(ConnectionEvent::Message);
                        match String::from_utf8(data.to_vec()) {
                            Ok(text) => relay.inbound(id, text).await?,
                            Err(e) => log::warn!(
                                "Discarding binary frame from {id}: {}",
                                ProtocolError::MalformedMessage(e.to_string())
                            ),
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        ws_sender.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        log::info!("Connection {id} closed by peer");
                        *phase = phase.on(ConnectionEvent::TransportClosed);
                    }
                    Some(Err(e)) => {
                        log::warn!("Connection {id}: {} ({e})", ProtocolError::ConnectionLost);
                        *phase = phase.on(ConnectionEvent::TransportClosed);
                    }
                    _ => {}
                }
            }

            frame = outbound_rx.recv() => {
                match frame {
                    Some(frame) => ws_sender.send(Message::text(frame.to_string())).await?,
                    None => *phase = phase.on(ConnectionEvent::TransportClosed),
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "127.0.0.1:3001");
        assert_eq!(config.command_buffer, 256);
    }

    #[test]
    fn test_custom_config() {
        let server = RelayServer::new(ServerConfig {
            bind_addr: "0.0.0.0:8080".to_string(),
            command_buffer: 16,
        });
        assert_eq!(server.bind_addr(), "0.0.0.0:8080");
    }

    #[tokio::test]
    async fn test_handle_reaches_served_relay() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = RelayServer::with_defaults();
        let handle = server.handle();
        tokio::spawn(server.serve(listener));

        let stats = handle.stats().await.unwrap();
        assert_eq!(stats.connections_accepted, 0);
        assert_eq!(stats.connections_open, 0);
    }
}
