//! # draftsync-core — Rich-text document model
//!
//! Headless document model used by draftsync clients:
//!
//! - [`block`] — content blocks and per-character metadata
//! - [`content`] — ordered blocks plus the entity map
//! - [`editor`] — selection and editing commands
//! - [`raw`] — serializable raw form and lossless conversion
//! - [`styles`] — toolbar catalog and custom style map
//!
//! ```text
//! EditorState ── current_content() ──► ContentState ── convert_to_raw() ──► RawDraftContentState
//!      ▲                                                                           │
//!      └──── create_with_content() ◄── ContentState ◄── convert_from_raw() ────────┘
//! ```

pub mod block;
pub mod content;
pub mod editor;
pub mod raw;
pub mod styles;

pub use block::{BlockType, CharacterMetadata, ContentBlock, InlineStyle};
pub use content::{ContentState, Entity, EntityKey, Mutability};
pub use editor::{EditError, EditorState, SelectionState};
pub use raw::{
    convert_from_raw, convert_to_raw, ConvertError, RawBlock, RawDraftContentState, RawEntity,
    RawEntityRange, RawInlineStyleRange,
};
pub use styles::{
    control_for_label, custom_style, is_block_editable, style_controls, CustomStyle, StyleControl,
    StyleTarget,
};
