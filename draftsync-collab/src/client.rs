//! WebSocket client for the relay.
//!
//! Provides:
//! - One connection per client, no reconnection
//! - Typed events for identity assignment and remote content
//! - Fire-and-forget sends that drop silently while disconnected

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::Message;

use crate::protocol::{Envelope, ProtocolError, UserId};

/// Client connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Events emitted by the sync client.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Connection established
    Connected,
    /// The relay announced our identity
    Assigned(UserId),
    /// Another client's full document
    RemoteContent {
        user_id: UserId,
        content: serde_json::Value,
    },
    /// Connection lost or closed
    Disconnected,
}

/// Client side of one relay connection.
pub struct SyncClient {
    /// Current connection state
    state: Arc<RwLock<ConnectionState>>,

    /// Channel to the WebSocket writer task
    outgoing_tx: Option<mpsc::Sender<Message>>,

    /// Event receiver for the application
    event_rx: Option<mpsc::Receiver<SyncEvent>>,

    /// Event sender (held by the reader task)
    event_tx: mpsc::Sender<SyncEvent>,

    server_url: String,
}

impl SyncClient {
    pub fn new(server_url: impl Into<String>) -> Self {
        let (event_tx, event_rx) = mpsc::channel(256);
        Self {
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            outgoing_tx: None,
            event_rx: Some(event_rx),
            event_tx,
            server_url: server_url.into(),
        }
    }

    /// Take the event receiver (can only be called once).
    pub fn take_event_rx(&mut self) -> Option<mpsc::Receiver<SyncEvent>> {
        self.event_rx.take()
    }

    /// Connect to the relay.
    ///
    /// Spawns background tasks for reading and writing WebSocket frames.
    pub async fn connect(&mut self) -> Result<(), ProtocolError> {
        *self.state.write().await = ConnectionState::Connecting;

        let ws_stream = match tokio_tungstenite::connect_async(self.server_url.as_str()).await {
            Ok((ws_stream, _)) => ws_stream,
            Err(e) => {
                *self.state.write().await = ConnectionState::Disconnected;
                return Err(ProtocolError::ConnectFailed(e.to_string()));
            }
        };
        let (mut ws_writer, mut ws_reader) = ws_stream.split();

        // Writer task: forward outgoing channel to WebSocket
        let (out_tx, mut out_rx) = mpsc::channel::<Message>(256);
        self.outgoing_tx = Some(out_tx);
        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if ws_writer.send(msg).await.is_err() || closing {
                    break;
                }
            }
        });

        *self.state.write().await = ConnectionState::Connected;
        let _ = self.event_tx.send(SyncEvent::Connected).await;
        log::info!("Connected to {}", self.server_url);

        // Reader task: turn frames into events
        let event_tx = self.event_tx.clone();
        let state = self.state.clone();
        tokio::spawn(async move {
            while let Some(msg) = ws_reader.next().await {
                let decoded = match msg {
                    Ok(Message::Text(text)) => Envelope::decode(text.as_str()),
                    Ok(Message::Binary(data)) => Envelope::decode_bytes(&data),
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        log::warn!("{}: {e}", ProtocolError::ConnectionLost);
                        break;
                    }
                };

                let event = match decoded {
                    Ok(Envelope::AssignUser { user_id }) => SyncEvent::Assigned(user_id),
                    Ok(Envelope::ContentUpdate { user_id, content }) => {
                        SyncEvent::RemoteContent { user_id, content }
                    }
                    Ok(other) => {
                        log::warn!("Ignoring {}", ProtocolError::UnexpectedMessage(other.kind()));
                        continue;
                    }
                    Err(e) => {
                        log::warn!("Discarding frame from relay: {e}");
                        continue;
                    }
                };
                let _ = event_tx.send(event).await;
            }

            *state.write().await = ConnectionState::Disconnected;
            let _ = event_tx.send(SyncEvent::Disconnected).await;
        });

        Ok(())
    }

    /// Send an envelope if connected.
    ///
    /// Returns `false` when the envelope was dropped because no connection is
    /// open. Nothing is queued for later.
    pub async fn send(&self, msg: &Envelope) -> Result<bool, ProtocolError> {
        if *self.state.read().await != ConnectionState::Connected {
            return Ok(false);
        }
        let Some(tx) = &self.outgoing_tx else {
            return Ok(false);
        };

        let frame = msg.encode()?;
        Ok(tx.send(Message::text(frame)).await.is_ok())
    }

    /// Close the connection. No reconnection follows.
    pub async fn close(&mut self) {
        if let Some(tx) = self.outgoing_tx.take() {
            let _ = tx.send(Message::Close(None)).await;
        }
        *self.state.write().await = ConnectionState::Disconnected;
    }

    /// Get the current connection state.
    pub async fn connection_state(&self) -> ConnectionState {
        *self.state.read().await
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }
}
