//! JSON wire protocol shared by the relay and its clients.
//!
//! Wire format (one envelope per WebSocket text frame):
//! ```text
//! { "type": "ASSIGN_USER",    "userId": "user-1" }
//! { "type": "CONTENT_CHANGE", "userId": "user-1", "content": { ...full document... } }
//! { "type": "CONTENT_UPDATE", "userId": "user-1", "content": { ...full document... } }
//! ```
//!
//! `content` is never interpreted here; it is a full-state snapshot that the
//! relay forwards unchanged.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identity assigned by the relay (`user-<n>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Top-level protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Envelope {
    /// Relay → client, once, right after accept.
    #[serde(rename_all = "camelCase")]
    AssignUser { user_id: UserId },
    /// Client → relay, on every local document mutation.
    #[serde(rename_all = "camelCase")]
    ContentChange { user_id: UserId, content: Value },
    /// Relay → every other client, one per accepted change.
    #[serde(rename_all = "camelCase")]
    ContentUpdate { user_id: UserId, content: Value },
}

impl Envelope {
    pub fn assign_user(user_id: UserId) -> Self {
        Self::AssignUser { user_id }
    }

    pub fn content_change(user_id: UserId, content: Value) -> Self {
        Self::ContentChange { user_id, content }
    }

    pub fn content_update(user_id: UserId, content: Value) -> Self {
        Self::ContentUpdate { user_id, content }
    }

    /// Wire name of this envelope's `type`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AssignUser { .. } => "ASSIGN_USER",
            Self::ContentChange { .. } => "CONTENT_CHANGE",
            Self::ContentUpdate { .. } => "CONTENT_UPDATE",
        }
    }

    pub fn user_id(&self) -> &UserId {
        match self {
            Self::AssignUser { user_id }
            | Self::ContentChange { user_id, .. }
            | Self::ContentUpdate { user_id, .. } => user_id,
        }
    }

    /// Restamp a client's change as the update fanned out to other clients.
    ///
    /// The declared `userId` is kept as-is.
    pub fn into_update(self) -> Result<Self, ProtocolError> {
        match self {
            Self::ContentChange { user_id, content } => Ok(Self::ContentUpdate { user_id, content }),
            other => Err(ProtocolError::UnexpectedMessage(other.kind())),
        }
    }

    /// Serialize to a wire frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::SerializationError(e.to_string()))
    }

    /// Parse a wire frame.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        if text.trim().is_empty() {
            return Err(ProtocolError::MalformedMessage("empty payload".to_string()));
        }
        serde_json::from_str(text).map_err(|e| ProtocolError::MalformedMessage(e.to_string()))
    }

    /// Parse a binary frame holding UTF-8 JSON.
    pub fn decode_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| ProtocolError::MalformedMessage(e.to_string()))?;
        Self::decode(text)
    }
}

/// Protocol errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    MalformedMessage(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Unexpected {0} message")]
    UnexpectedMessage(&'static str),
    #[error("Transport unavailable")]
    TransportUnavailable,
    #[error("Connection lost")]
    ConnectionLost,
    #[error("Connection failed: {0}")]
    ConnectFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_assign_user_wire_format() {
        let encoded = Envelope::assign_user(UserId::new("user-1")).encode().unwrap();
        let value: Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(value, json!({ "type": "ASSIGN_USER", "userId": "user-1" }));
    }

    #[test]
    fn test_content_change_wire_format() {
        let content = json!({ "blocks": [{ "key": "a", "text": "hi" }], "entityMap": {} });
        let msg = Envelope::content_change(UserId::new("user-2"), content.clone());
        let value: Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(value["type"], "CONTENT_CHANGE");
        assert_eq!(value["userId"], "user-2");
        assert_eq!(value["content"], content);
    }

    #[test]
    fn test_decode_client_frame() {
        let frame = r#"{"type":"CONTENT_CHANGE","userId":"user-7","content":{"blocks":[]}}"#;
        let msg = Envelope::decode(frame).unwrap();
        assert_eq!(msg.kind(), "CONTENT_CHANGE");
        assert_eq!(msg.user_id().as_str(), "user-7");
    }

    #[test]
    fn test_content_is_opaque() {
        // Arbitrary JSON passes through untouched, including non-document shapes.
        let content = json!([1, "two", { "three": null }]);
        let msg = Envelope::content_update(UserId::new("user-1"), content.clone());
        let decoded = Envelope::decode(&msg.encode().unwrap()).unwrap();
        assert_eq!(decoded, Envelope::content_update(UserId::new("user-1"), content));
    }

    #[test]
    fn test_decode_empty_is_malformed() {
        assert!(matches!(Envelope::decode(""), Err(ProtocolError::MalformedMessage(_))));
        assert!(matches!(Envelope::decode("  \n\t"), Err(ProtocolError::MalformedMessage(_))));
    }

    #[test]
    fn test_decode_not_json_is_malformed() {
        assert!(matches!(
            Envelope::decode("not json"),
            Err(ProtocolError::MalformedMessage(_))
        ));
    }

    #[test]
    fn test_decode_unknown_type_or_missing_fields() {
        assert!(Envelope::decode(r#"{"type":"DELETE_EVERYTHING","userId":"u"}"#).is_err());
        assert!(Envelope::decode(r#"{"type":"CONTENT_CHANGE","userId":"u"}"#).is_err());
        assert!(Envelope::decode(r#"{"type":"CONTENT_CHANGE","userId":null,"content":{}}"#).is_err());
        assert!(Envelope::decode(r#"{"userId":"u","content":{}}"#).is_err());
    }

    #[test]
    fn test_decode_bytes_rejects_invalid_utf8() {
        assert!(matches!(
            Envelope::decode_bytes(&[0xFF, 0xFE, 0xFD]),
            Err(ProtocolError::MalformedMessage(_))
        ));
        let ok = Envelope::decode_bytes(br#"{"type":"ASSIGN_USER","userId":"user-3"}"#).unwrap();
        assert_eq!(ok, Envelope::assign_user(UserId::new("user-3")));
    }

    #[test]
    fn test_into_update_keeps_declared_user() {
        let change = Envelope::content_change(UserId::new("someone-else"), json!({ "x": 1 }));
        let update = change.into_update().unwrap();
        assert_eq!(
            update,
            Envelope::content_update(UserId::new("someone-else"), json!({ "x": 1 }))
        );
    }

    #[test]
    fn test_into_update_rejects_other_variants() {
        let assign = Envelope::assign_user(UserId::new("user-1"));
        assert_eq!(
            assign.into_update(),
            Err(ProtocolError::UnexpectedMessage("ASSIGN_USER"))
        );
    }
}
