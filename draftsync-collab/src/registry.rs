//! Live connection set and fan-out to every peer except the sender.
//!
//! Each connection owns an unbounded outbound queue drained by its socket
//! task. Frames are encoded once per broadcast and shared as `Arc<str>`.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::identity::ConnectionId;
use crate::protocol::{Envelope, ProtocolError, UserId};

/// Outbound frame queue of one connection.
pub type Outbound = mpsc::UnboundedSender<Arc<str>>;

/// Counters for monitoring fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastStats {
    /// Envelopes fanned out.
    pub messages_sent: u64,
    /// Individual frames queued to peers.
    pub deliveries: u64,
    /// Peers skipped because their socket was no longer writable.
    pub skipped: u64,
    pub active_connections: usize,
}

/// Registry entry for one open connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    user_id: UserId,
    outbound: Outbound,
}

impl ConnectionHandle {
    pub fn new(id: ConnectionId, user_id: UserId, outbound: Outbound) -> Self {
        Self {
            id,
            user_id,
            outbound,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// False once the socket task has dropped its receiver.
    pub fn is_writable(&self) -> bool {
        !self.outbound.is_closed()
    }

    pub fn send(&self, frame: Arc<str>) -> Result<(), ProtocolError> {
        self.outbound
            .send(frame)
            .map_err(|_| ProtocolError::TransportUnavailable)
    }
}

/// Open connections keyed by id, iterated in accept order.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: BTreeMap<ConnectionId, ConnectionHandle>,
    stats: BroadcastStats,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handle: ConnectionHandle) {
        self.connections.insert(handle.id, handle);
    }

    /// Remove a connection. Removing an unknown id is a no-op.
    pub fn unregister(&mut self, id: ConnectionId) -> Option<ConnectionHandle> {
        self.connections.remove(&id)
    }

    pub fn get(&self, id: ConnectionId) -> Option<&ConnectionHandle> {
        self.connections.get(&id)
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn user_ids(&self) -> Vec<UserId> {
        self.connections.values().map(|c| c.user_id.clone()).collect()
    }

    /// Queue one envelope to a single connection.
    pub fn send_to(&self, id: ConnectionId, msg: &Envelope) -> Result<(), ProtocolError> {
        let handle = self
            .connections
            .get(&id)
            .ok_or(ProtocolError::TransportUnavailable)?;
        handle.send(Arc::from(msg.encode()?))
    }

    /// Queue `msg` to every writable connection other than `sender`.
    ///
    /// Returns the number of peers the frame was queued to.
    pub fn broadcast_except(
        &mut self,
        sender: ConnectionId,
        msg: &Envelope,
    ) -> Result<usize, ProtocolError> {
        let frame: Arc<str> = Arc::from(msg.encode()?);
        let mut delivered = 0;

        for (id, handle) in &self.connections {
            if *id == sender {
                continue;
            }
            if !handle.is_writable() || handle.send(Arc::clone(&frame)).is_err() {
                self.stats.skipped += 1;
                log::debug!("Skipping {} ({}): not writable", id, handle.user_id);
                continue;
            }
            log::trace!("Queued {} to {} ({})", msg.kind(), id, handle.user_id);
            delivered += 1;
        }

        self.stats.messages_sent += 1;
        self.stats.deliveries += delivered as u64;
        Ok(delivered)
    }

    pub fn stats(&self) -> BroadcastStats {
        BroadcastStats {
            active_connections: self.connections.len(),
            ..self.stats
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityAssigner;
    use serde_json::json;

    fn connect(
        registry: &mut ConnectionRegistry,
        assigner: &mut IdentityAssigner,
    ) -> (ConnectionId, mpsc::UnboundedReceiver<Arc<str>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (id, user) = assigner.assign();
        registry.register(ConnectionHandle::new(id, user, tx));
        (id, rx)
    }

    #[test]
    fn test_broadcast_excludes_sender() {
        let mut registry = ConnectionRegistry::new();
        let mut assigner = IdentityAssigner::new();
        let (a, mut rx_a) = connect(&mut registry, &mut assigner);
        let (_b, mut rx_b) = connect(&mut registry, &mut assigner);
        let (_c, mut rx_c) = connect(&mut registry, &mut assigner);

        let update = Envelope::content_update(UserId::new("user-1"), json!({ "v": 1 }));
        assert_eq!(registry.broadcast_except(a, &update).unwrap(), 2);

        assert!(rx_a.try_recv().is_err());
        let expected = update.encode().unwrap();
        assert_eq!(&*rx_b.try_recv().unwrap(), expected.as_str());
        assert_eq!(&*rx_c.try_recv().unwrap(), expected.as_str());
    }

    #[test]
    fn test_single_connection_receives_nothing() {
        let mut registry = ConnectionRegistry::new();
        let mut assigner = IdentityAssigner::new();
        let (a, mut rx_a) = connect(&mut registry, &mut assigner);

        let update = Envelope::content_update(UserId::new("user-1"), json!({}));
        assert_eq!(registry.broadcast_except(a, &update).unwrap(), 0);
        assert!(rx_a.try_recv().is_err());
    }

    #[test]
    fn test_closed_receiver_is_skipped() {
        let mut registry = ConnectionRegistry::new();
        let mut assigner = IdentityAssigner::new();
        let (a, _rx_a) = connect(&mut registry, &mut assigner);
        let (_b, rx_b) = connect(&mut registry, &mut assigner);
        let (_c, mut rx_c) = connect(&mut registry, &mut assigner);
        drop(rx_b);

        let update = Envelope::content_update(UserId::new("user-1"), json!({}));
        assert_eq!(registry.broadcast_except(a, &update).unwrap(), 1);
        assert!(rx_c.try_recv().is_ok());

        let stats = registry.stats();
        assert_eq!(stats.messages_sent, 1);
        assert_eq!(stats.deliveries, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.active_connections, 3);
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let mut registry = ConnectionRegistry::new();
        let mut assigner = IdentityAssigner::new();
        let (a, _rx) = connect(&mut registry, &mut assigner);

        assert!(registry.unregister(a).is_some());
        assert!(registry.unregister(a).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_send_to_unknown_connection() {
        let registry = ConnectionRegistry::new();
        let mut assigner = IdentityAssigner::new();
        let (id, user) = assigner.assign();
        assert_eq!(
            registry.send_to(id, &Envelope::assign_user(user)),
            Err(ProtocolError::TransportUnavailable)
        );
    }
}
