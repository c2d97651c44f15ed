//! # draftsync-collab — Real-time relay and sync client
//!
//! Star-topology sync of a rich-text document:
//!
//! - [`protocol`] — JSON envelopes (`ASSIGN_USER`, `CONTENT_CHANGE`, `CONTENT_UPDATE`)
//! - [`identity`] — `user-<n>` assignment
//! - [`registry`] — live connections and fan-out except the sender
//! - [`relay`] — single-task relay loop and its command handle
//! - [`server`] — WebSocket accept loop and per-connection tasks
//! - [`client`] — WebSocket client with typed events
//! - [`reconciler`] — editor ↔ wire payload conversion
//! - [`authors`] — de-duplicated author log
//! - [`session`] — editor, identity and author log bound to a client
//!
//! ```text
//!   ClientSession X                 RelayServer                 ClientSession Y
//!   ──────────────                  ───────────                 ──────────────
//!                      ◄── ASSIGN_USER{user-1}
//!                                        ASSIGN_USER{user-2} ──►
//!   edit ─► CONTENT_CHANGE{user-1} ──►
//!                                        CONTENT_UPDATE{user-1} ──► replace document
//!                                                                   Author: user-1
//! ```

pub mod authors;
pub mod client;
pub mod identity;
pub mod protocol;
pub mod reconciler;
pub mod registry;
pub mod relay;
pub mod server;
pub mod session;

pub use authors::AuthorLog;
pub use client::{ConnectionState, SyncClient, SyncEvent};
pub use identity::{ConnectionId, IdentityAssigner};
pub use protocol::{Envelope, ProtocolError, UserId};
pub use reconciler::ReconcileError;
pub use registry::{BroadcastStats, ConnectionHandle, ConnectionRegistry};
pub use relay::{ConnectionPhase, Relay, RelayHandle, RelayStats};
pub use server::{RelayServer, ServerConfig, ServerError};
pub use session::{ClientSession, SessionError, SessionState, SessionUpdate};
