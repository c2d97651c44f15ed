//! Broadcast relay: owns identities and the registry, driven by commands.
//!
//! ```text
//!  socket task ──► RelayHandle ── mpsc<RelayCommand> ──► run() ──► Relay
//!       ▲                                                        │
//!       └──────────── UnboundedSender<Arc<str>> ◄── broadcast ────┘
//! ```
//!
//! All state mutation happens on the single task running [`run`], so the
//! relay needs no locks.

use tokio::sync::{mpsc, oneshot};

use crate::identity::{ConnectionId, IdentityAssigner};
use crate::protocol::{Envelope, ProtocolError};
use crate::registry::{BroadcastStats, ConnectionHandle, ConnectionRegistry, Outbound};

/// Lifecycle of one relay-side connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionPhase {
    #[default]
    Connecting,
    Open,
    Closed,
}

/// Events observed by a connection task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    Accepted,
    Message,
    TransportClosed,
}

impl ConnectionPhase {
    /// Next phase after `event`. `Closed` is terminal.
    pub fn on(self, event: ConnectionEvent) -> Self {
        match (self, event) {
            (Self::Closed, _) => Self::Closed,
            (_, ConnectionEvent::TransportClosed) => Self::Closed,
            (Self::Connecting, ConnectionEvent::Accepted) => Self::Open,
            (Self::Connecting, ConnectionEvent::Message) => Self::Connecting,
            (Self::Open, _) => Self::Open,
        }
    }

    pub fn is_open(self) -> bool {
        self == Self::Open
    }
}

/// Relay counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub connections_accepted: u64,
    pub connections_open: usize,
    pub messages_relayed: u64,
    pub messages_discarded: u64,
    pub broadcast: BroadcastStats,
}

/// Relay state.
#[derive(Debug, Default)]
pub struct Relay {
    identities: IdentityAssigner,
    registry: ConnectionRegistry,
    relayed: u64,
    discarded: u64,
}

impl Relay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign an identity, register the connection and send it `ASSIGN_USER`.
    pub fn accept(&mut self, outbound: Outbound) -> ConnectionId {
        let (id, user_id) = self.identities.assign();
        self.registry
            .register(ConnectionHandle::new(id, user_id.clone(), outbound));

        if let Err(e) = self.registry.send_to(id, &Envelope::assign_user(user_id.clone())) {
            log::warn!("Could not assign {} to {}: {}", user_id, id, e);
        }
        log::info!(
            "Connection {} assigned {} ({} open)",
            id,
            user_id,
            self.registry.len()
        );
        id
    }

    /// Handle one inbound text frame. Bad frames are discarded.
    ///
    /// Returns the number of peers the update was queued to.
    pub fn receive(&mut self, from: ConnectionId, text: &str) -> Result<usize, ProtocolError> {
        match self.relay(from, text) {
            Ok(delivered) => {
                self.relayed += 1;
                Ok(delivered)
            }
            Err(e) => {
                self.discarded += 1;
                log::warn!("Discarding message from {}: {}", from, e);
                Err(e)
            }
        }
    }

    fn relay(&mut self, from: ConnectionId, text: &str) -> Result<usize, ProtocolError> {
        let update = Envelope::decode(text)?.into_update()?;
        let delivered = self.registry.broadcast_except(from, &update)?;
        log::debug!(
            "Relayed update from {} (declared {}) to {} peer(s)",
            from,
            update.user_id(),
            delivered
        );
        Ok(delivered)
    }

    /// Unregister a connection. Safe to call more than once.
    pub fn close(&mut self, id: ConnectionId) {
        if let Some(handle) = self.registry.unregister(id) {
            log::info!(
                "Connection {} ({}) closed ({} open)",
                id,
                handle.user_id(),
                self.registry.len()
            );
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn stats(&self) -> RelayStats {
        RelayStats {
            connections_accepted: self.identities.issued(),
            connections_open: self.registry.len(),
            messages_relayed: self.relayed,
            messages_discarded: self.discarded,
            broadcast: self.registry.stats(),
        }
    }

    /// Apply one command.
    pub fn handle(&mut self, command: RelayCommand) {
        match command {
            RelayCommand::Accept { outbound, reply } => {
                let id = self.accept(outbound);
                if reply.send(id).is_err() {
                    // Connection task is gone before it learned its id.
                    self.close(id);
                }
            }
            RelayCommand::Inbound { from, text } => {
                let _ = self.receive(from, &text);
            }
            RelayCommand::Close { from } => self.close(from),
            RelayCommand::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
        }
    }
}

/// Commands sent to the relay loop.
#[derive(Debug)]
pub enum RelayCommand {
    Accept {
        outbound: Outbound,
        reply: oneshot::Sender<ConnectionId>,
    },
    Inbound {
        from: ConnectionId,
        text: String,
    },
    Close {
        from: ConnectionId,
    },
    Stats {
        reply: oneshot::Sender<RelayStats>,
    },
}

/// Cloneable entry point to a running relay loop.
#[derive(Debug, Clone)]
pub struct RelayHandle {
    commands: mpsc::Sender<RelayCommand>,
}

impl RelayHandle {
    pub fn new(commands: mpsc::Sender<RelayCommand>) -> Self {
        Self { commands }
    }

    pub async fn accept(&self, outbound: Outbound) -> Result<ConnectionId, ProtocolError> {
        let (reply, rx) = oneshot::channel();
        self.send(RelayCommand::Accept { outbound, reply }).await?;
        rx.await.map_err(|_| ProtocolError::ConnectionLost)
    }

    pub async fn inbound(&self, from: ConnectionId, text: String) -> Result<(), ProtocolError> {
        self.send(RelayCommand::Inbound { from, text }).await
    }

    pub async fn close(&self, from: ConnectionId) -> Result<(), ProtocolError> {
        self.send(RelayCommand::Close { from }).await
    }

    pub async fn stats(&self) -> Result<RelayStats, ProtocolError> {
        let (reply, rx) = oneshot::channel();
        self.send(RelayCommand::Stats { reply }).await?;
        rx.await.map_err(|_| ProtocolError::ConnectionLost)
    }

    async fn send(&self, command: RelayCommand) -> Result<(), ProtocolError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ProtocolError::ConnectionLost)
    }
}

/// Drive `relay` until every handle is dropped.
pub async fn run(mut relay: Relay, mut commands: mpsc::Receiver<RelayCommand>) -> Relay {
    while let Some(command) = commands.recv().await {
        relay.handle(command);
    }
    log::debug!("Relay loop stopped");
    relay
}

/// Spawn a relay loop and return its handle.
pub fn spawn(buffer: usize) -> RelayHandle {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    tokio::spawn(run(Relay::new(), rx));
    RelayHandle::new(tx)
}
