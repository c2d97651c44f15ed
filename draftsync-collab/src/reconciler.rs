//! Conversion between the live editor and the `content` payload on the wire.

use draftsync_core::{convert_from_raw, convert_to_raw, ConvertError, EditorState, RawDraftContentState};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("content is not a raw document: {0}")]
    InvalidPayload(#[source] serde_json::Error),
    #[error(transparent)]
    Conversion(#[from] ConvertError),
    #[error("could not serialize document: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Raw form of the editor's current document as JSON.
pub fn to_payload(editor: &EditorState) -> Result<Value, ReconcileError> {
    serde_json::to_value(convert_to_raw(editor.current_content())).map_err(ReconcileError::Serialize)
}

/// Build an editor from a received payload. The cursor lands at the start of
/// the first block.
pub fn from_payload(content: &Value) -> Result<EditorState, ReconcileError> {
    let raw = RawDraftContentState::deserialize(content).map_err(ReconcileError::InvalidPayload)?;
    let state = convert_from_raw(&raw)?;
    Ok(EditorState::create_with_content(state))
}

/// Replace `editor` with the payload's document. On error `editor` is untouched.
pub fn replace_document(editor: &mut EditorState, content: &Value) -> Result<(), ReconcileError> {
    *editor = from_payload(content)?;
    Ok(())
}
