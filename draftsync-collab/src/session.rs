//! Client session: one editor, one relay connection, one author log.
//!
//! [`SessionState`] holds the pure bookkeeping so it can be driven without a
//! network; [`ClientSession`] wires it to a [`SyncClient`].

use draftsync_core::{EditError, EditorState};
use tokio::sync::mpsc;

use crate::authors::AuthorLog;
use crate::client::{ConnectionState, SyncClient, SyncEvent};
use crate::protocol::{Envelope, ProtocolError, UserId};
use crate::reconciler::{self, ReconcileError};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Edit(#[from] EditError),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// What applying one event did to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    Connected,
    Assigned(UserId),
    /// Document replaced by a remote update.
    Replaced { author: UserId, new_author: bool },
    /// Remote content could not be converted and was dropped.
    Discarded { author: UserId },
    Disconnected,
}

/// Editor, identity and author log of one client.
#[derive(Debug, Default)]
pub struct SessionState {
    user_id: Option<UserId>,
    editor: EditorState,
    authors: AuthorLog,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.user_id.as_ref()
    }

    pub fn editor(&self) -> &EditorState {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut EditorState {
        &mut self.editor
    }

    pub fn authors(&self) -> &AuthorLog {
        &self.authors
    }

    /// The `CONTENT_CHANGE` announcing the current document, or `None` while
    /// no identity has been assigned.
    pub fn local_change(&self) -> Result<Option<Envelope>, ReconcileError> {
        let Some(user_id) = &self.user_id else {
            return Ok(None);
        };
        let content = reconciler::to_payload(&self.editor)?;
        Ok(Some(Envelope::content_change(user_id.clone(), content)))
    }

    pub fn apply(&mut self, event: SyncEvent) -> SessionUpdate {
        match event {
            SyncEvent::Connected => SessionUpdate::Connected,
            SyncEvent::Assigned(user_id) => {
                log::info!("Assigned identity {user_id}");
                self.user_id = Some(user_id.clone());
                SessionUpdate::Assigned(user_id)
            }
            SyncEvent::RemoteContent { user_id, content } => {
                match reconciler::replace_document(&mut self.editor, &content) {
                    Ok(()) => {
                        let new_author = self.authors.record(user_id.clone());
                        log::debug!("Document replaced by {user_id}");
                        SessionUpdate::Replaced {
                            author: user_id,
                            new_author,
                        }
                    }
                    Err(e) => {
                        log::warn!("Discarding update from {user_id}: {e}");
                        SessionUpdate::Discarded { author: user_id }
                    }
                }
            }
            SyncEvent::Disconnected => SessionUpdate::Disconnected,
        }
    }
}

/// A connected editing session.
pub struct ClientSession {
    client: SyncClient,
    events: mpsc::Receiver<SyncEvent>,
    state: SessionState,
}

impl ClientSession {
    /// Connect to the relay at `url`.
    pub async fn connect(url: impl Into<String>) -> Result<Self, SessionError> {
        let mut client = SyncClient::new(url);
        let events = client
            .take_event_rx()
            .ok_or(ProtocolError::TransportUnavailable)?;
        client.connect().await?;
        Ok(Self {
            client,
            events,
            state: SessionState::new(),
        })
    }

    /// Apply one local edit, then publish the document.
    ///
    /// Returns whether the change was sent.
    pub async fn edit<F>(&mut self, f: F) -> Result<bool, SessionError>
    where
        F: FnOnce(&mut EditorState) -> Result<(), EditError>,
    {
        f(self.state.editor_mut())?;
        self.on_change().await
    }

    /// Publish the current document. Dropped while disconnected or unassigned.
    pub async fn on_change(&self) -> Result<bool, SessionError> {
        match self.state.local_change()? {
            Some(change) => Ok(self.client.send(&change).await?),
            None => {
                log::debug!("No identity yet, dropping local change");
                Ok(false)
            }
        }
    }

    /// Wait for and apply the next event. `None` once the client is gone.
    pub async fn next_event(&mut self) -> Option<SessionUpdate> {
        let event = self.events.recv().await?;
        Some(self.state.apply(event))
    }

    /// Process events until the relay has assigned an identity.
    pub async fn wait_for_identity(&mut self) -> Result<UserId, SessionError> {
        while let Some(update) = self.next_event().await {
            match update {
                SessionUpdate::Assigned(user_id) => return Ok(user_id),
                SessionUpdate::Disconnected => break,
                _ => {}
            }
        }
        Err(ProtocolError::ConnectionLost.into())
    }

    pub async fn close(&mut self) {
        self.client.close().await;
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.client.connection_state().await
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.state.user_id()
    }

    pub fn editor(&self) -> &EditorState {
        self.state.editor()
    }

    pub fn authors(&self) -> &AuthorLog {
        self.state.authors()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn remote_doc(text: &str) -> serde_json::Value {
        let mut editor = EditorState::create_empty();
        editor.insert_text(text).unwrap();
        reconciler::to_payload(&editor).unwrap()
    }

    #[test]
    fn test_no_change_before_assignment() {
        let mut state = SessionState::new();
        state.editor_mut().insert_text("early").unwrap();
        assert!(state.local_change().unwrap().is_none());

        state.apply(SyncEvent::Assigned(UserId::new("user-4")));
        let change = state.local_change().unwrap().unwrap();
        assert_eq!(change.kind(), "CONTENT_CHANGE");
        assert_eq!(change.user_id().as_str(), "user-4");
    }

    #[test]
    fn test_duplicate_update_logs_author_once() {
        let mut state = SessionState::new();
        let event = SyncEvent::RemoteContent {
            user_id: UserId::new("user-1"),
            content: remote_doc("hello"),
        };

        assert_eq!(
            state.apply(event.clone()),
            SessionUpdate::Replaced {
                author: UserId::new("user-1"),
                new_author: true
            }
        );
        assert_eq!(
            state.apply(event),
            SessionUpdate::Replaced {
                author: UserId::new("user-1"),
                new_author: false
            }
        );
        assert_eq!(state.authors().display_lines(), ["Author: user-1"]);
        assert_eq!(state.editor().plain_text(), "hello");
    }

    #[test]
    fn test_update_replaces_document_and_cursor() {
        let mut state = SessionState::new();
        state.editor_mut().insert_text("mine\nlonger").unwrap();

        state.apply(SyncEvent::RemoteContent {
            user_id: UserId::new("user-2"),
            content: remote_doc("theirs"),
        });

        let editor = state.editor();
        assert_eq!(editor.plain_text(), "theirs");
        assert_eq!(editor.selection().focus_offset(), 0);
        assert_eq!(
            editor.selection().focus_key(),
            editor.current_content().first_block().key()
        );
    }

    #[test]
    fn test_invalid_content_is_discarded() {
        let mut state = SessionState::new();
        state.editor_mut().insert_text("unchanged").unwrap();

        let update = state.apply(SyncEvent::RemoteContent {
            user_id: UserId::new("user-3"),
            content: json!({ "not": "a document" }),
        });

        assert_eq!(update, SessionUpdate::Discarded { author: UserId::new("user-3") });
        assert_eq!(state.editor().plain_text(), "unchanged");
        assert!(state.authors().is_empty());
    }

    #[test]
    fn test_extreme_entity_key_is_handled() {
        let mut state = SessionState::new();
        let content = json!({
            "blocks": [{
                "key": "k1",
                "text": " ",
                "type": "atomic",
                "entityRanges": [{ "offset": 0, "length": 1, "key": u64::MAX }]
            }],
            "entityMap": {
                "18446744073709551615": { "type": "IMAGE", "mutability": "IMMUTABLE", "data": {} }
            }
        });

        let update = state.apply(SyncEvent::RemoteContent {
            user_id: UserId::new("user-5"),
            content,
        });
        assert_eq!(
            update,
            SessionUpdate::Replaced {
                author: UserId::new("user-5"),
                new_author: true
            }
        );
        assert!(state.editor().current_content().first_block().entity_at(0).is_some());
    }

    #[test]
    fn test_aliased_entity_keys_are_discarded() {
        let mut state = SessionState::new();
        state.editor_mut().insert_text("unchanged").unwrap();

        let update = state.apply(SyncEvent::RemoteContent {
            user_id: UserId::new("user-6"),
            content: json!({
                "blocks": [{ "key": "k1", "text": "x" }],
                "entityMap": {
                    "0": { "type": "LINK", "mutability": "MUTABLE" },
                    "00": { "type": "LINK", "mutability": "MUTABLE" }
                }
            }),
        });

        assert_eq!(update, SessionUpdate::Discarded { author: UserId::new("user-6") });
        assert_eq!(state.editor().plain_text(), "unchanged");
        assert!(state.authors().is_empty());
    }
}
