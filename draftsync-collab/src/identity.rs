//! Connection ids and user identity assignment.

use std::fmt;

use crate::protocol::UserId;

/// Relay-side id of one accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn get(self) -> u64 {
        self.0
    }

    /// The identity string announced to this connection.
    pub fn user_id(self) -> UserId {
        UserId::new(format!("user-{}", self.0))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Hands out `user-1`, `user-2`, ... in accept order.
///
/// Ids are never reused, even after the connection closes.
#[derive(Debug, Default)]
pub struct IdentityAssigner {
    issued: u64,
}

impl IdentityAssigner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&mut self) -> (ConnectionId, UserId) {
        self.issued += 1;
        let id = ConnectionId(self.issued);
        (id, id.user_id())
    }

    /// Number of identities issued so far.
    pub fn issued(&self) -> u64 {
        self.issued
    }
}
