//! Content blocks: the paragraphs, headings and list items of a document.
//!
//! Every block stores its text together with one [`CharacterMetadata`] per
//! character, so inline styles and entity references can be looked up by
//! char offset without re-deriving ranges.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::content::EntityKey;

/// Set of inline style names applied to a single character (`BOLD`, `ITALIC`, ...).
pub type InlineStyle = BTreeSet<String>;

/// Block-level type of a [`ContentBlock`].
///
/// Unknown type strings are kept verbatim in [`BlockType::Custom`] so that
/// documents produced by other editors survive a round trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BlockType {
    #[default]
    Unstyled,
    Paragraph,
    HeaderOne,
    HeaderTwo,
    HeaderThree,
    HeaderFour,
    HeaderFive,
    HeaderSix,
    Blockquote,
    UnorderedListItem,
    OrderedListItem,
    CodeBlock,
    Atomic,
    Custom(String),
}

impl BlockType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Unstyled => "unstyled",
            Self::Paragraph => "paragraph",
            Self::HeaderOne => "header-one",
            Self::HeaderTwo => "header-two",
            Self::HeaderThree => "header-three",
            Self::HeaderFour => "header-four",
            Self::HeaderFive => "header-five",
            Self::HeaderSix => "header-six",
            Self::Blockquote => "blockquote",
            Self::UnorderedListItem => "unordered-list-item",
            Self::OrderedListItem => "ordered-list-item",
            Self::CodeBlock => "code-block",
            Self::Atomic => "atomic",
            Self::Custom(name) => name,
        }
    }

    /// Atomic blocks hold a single entity and are not editable as text.
    pub fn is_atomic(&self) -> bool {
        matches!(self, Self::Atomic)
    }
}

impl From<&str> for BlockType {
    fn from(value: &str) -> Self {
        match value {
            "unstyled" => Self::Unstyled,
            "paragraph" => Self::Paragraph,
            "header-one" => Self::HeaderOne,
            "header-two" => Self::HeaderTwo,
            "header-three" => Self::HeaderThree,
            "header-four" => Self::HeaderFour,
            "header-five" => Self::HeaderFive,
            "header-six" => Self::HeaderSix,
            "blockquote" => Self::Blockquote,
            "unordered-list-item" => Self::UnorderedListItem,
            "ordered-list-item" => Self::OrderedListItem,
            "code-block" => Self::CodeBlock,
            "atomic" => Self::Atomic,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl From<String> for BlockType {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<BlockType> for String {
    fn from(value: BlockType) -> Self {
        match value {
            BlockType::Custom(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-character formatting.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CharacterMetadata {
    pub style: InlineStyle,
    pub entity: Option<EntityKey>,
}

impl CharacterMetadata {
    pub fn styled(style: InlineStyle) -> Self {
        Self { style, entity: None }
    }
}

/// A single block of a document.
///
/// Invariant: `characters.len() == text.chars().count()`.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentBlock {
    key: String,
    block_type: BlockType,
    text: String,
    characters: Vec<CharacterMetadata>,
    depth: u32,
    data: Map<String, Value>,
}

impl ContentBlock {
    /// Create a block with unstyled text.
    pub fn new(key: impl Into<String>, block_type: BlockType, text: impl Into<String>) -> Self {
        let text = text.into();
        let characters = vec![CharacterMetadata::default(); text.chars().count()];
        Self {
            key: key.into(),
            block_type,
            text,
            characters,
            depth: 0,
            data: Map::new(),
        }
    }

    /// Create a block from text and matching character metadata.
    ///
    /// Returns `None` when the metadata length does not match the char count.
    pub fn with_characters(
        key: impl Into<String>,
        block_type: BlockType,
        text: impl Into<String>,
        characters: Vec<CharacterMetadata>,
    ) -> Option<Self> {
        let text = text.into();
        if text.chars().count() != characters.len() {
            return None;
        }
        Some(Self {
            key: key.into(),
            block_type,
            text,
            characters,
            depth: 0,
            data: Map::new(),
        })
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn block_type(&self) -> &BlockType {
        &self.block_type
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn characters(&self) -> &[CharacterMetadata] {
        &self.characters
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Length in chars.
    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    pub fn style_at(&self, offset: usize) -> Option<&InlineStyle> {
        self.characters.get(offset).map(|c| &c.style)
    }

    pub fn entity_at(&self, offset: usize) -> Option<EntityKey> {
        self.characters.get(offset).and_then(|c| c.entity)
    }

    pub(crate) fn set_block_type(&mut self, block_type: BlockType) {
        self.block_type = block_type;
    }

    pub(crate) fn characters_mut(&mut self) -> &mut [CharacterMetadata] {
        &mut self.characters
    }

    /// Insert `text` at char `offset`, every new char carrying `meta`.
    pub(crate) fn insert(&mut self, offset: usize, text: &str, meta: &CharacterMetadata) {
        let at = byte_index(&self.text, offset);
        self.text.insert_str(at, text);
        let added = text.chars().count();
        self.characters
            .splice(offset..offset, std::iter::repeat(meta.clone()).take(added));
    }

    /// Remove chars in `start..end`.
    pub(crate) fn remove(&mut self, start: usize, end: usize) {
        let from = byte_index(&self.text, start);
        let to = byte_index(&self.text, end);
        self.text.replace_range(from..to, "");
        self.characters.drain(start..end);
    }

    /// Split at `offset`, keeping the head and returning the tail as a new
    /// block with `new_key` and the same type and depth.
    pub(crate) fn split_off(&mut self, offset: usize, new_key: String) -> ContentBlock {
        let at = byte_index(&self.text, offset);
        let tail_text = self.text.split_off(at);
        let tail_chars = self.characters.split_off(offset);
        ContentBlock {
            key: new_key,
            block_type: self.block_type.clone(),
            text: tail_text,
            characters: tail_chars,
            depth: self.depth,
            data: Map::new(),
        }
    }

    /// Append another block's text and metadata to this one.
    pub(crate) fn append(&mut self, other: ContentBlock) {
        self.text.push_str(&other.text);
        self.characters.extend(other.characters);
    }
}

/// Byte index of char `offset` in `text` (clamped to the end).
pub(crate) fn byte_index(text: &str, offset: usize) -> usize {
    text.char_indices()
        .nth(offset)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}
