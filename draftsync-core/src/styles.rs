//! Toolbar style catalog and custom inline style map.

use crate::block::{BlockType, ContentBlock};
use crate::editor::EditorState;

/// What a toolbar control toggles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StyleTarget {
    Block(BlockType),
    Inline(&'static str),
}

/// One toolbar button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleControl {
    pub label: &'static str,
    pub target: StyleTarget,
}

impl StyleControl {
    fn block(label: &'static str, block_type: BlockType) -> Self {
        Self {
            label,
            target: StyleTarget::Block(block_type),
        }
    }

    fn inline(label: &'static str, style: &'static str) -> Self {
        Self {
            label,
            target: StyleTarget::Inline(style),
        }
    }

    /// Whether the button shows as pressed for the current selection.
    pub fn is_active(&self, editor: &EditorState) -> bool {
        match &self.target {
            StyleTarget::Block(block_type) => editor.current_block_type() == block_type,
            StyleTarget::Inline(style) => editor.current_inline_style().contains(*style),
        }
    }

    pub fn toggle(&self, editor: &mut EditorState) {
        match &self.target {
            StyleTarget::Block(block_type) => editor.toggle_block_type(block_type.clone()),
            StyleTarget::Inline(style) => editor.toggle_inline_style(style),
        }
    }
}

/// The toolbar, in display order.
pub fn style_controls() -> Vec<StyleControl> {
    vec![
        StyleControl::block("H1", BlockType::HeaderOne),
        StyleControl::block("H2", BlockType::HeaderTwo),
        StyleControl::block("Blockquote", BlockType::Blockquote),
        StyleControl::block("UL", BlockType::UnorderedListItem),
        StyleControl::block("OL", BlockType::OrderedListItem),
        StyleControl::block("Code Block", BlockType::CodeBlock),
        StyleControl::inline("Bold", "BOLD"),
        StyleControl::inline("Italic", "ITALIC"),
        StyleControl::inline("Underline", "UNDERLINE"),
        StyleControl::inline("Strikethrough", "STRIKETHROUGH"),
        StyleControl::inline("Highlight", "HIGHLIGHT"),
        StyleControl::inline("Red Text", "RED_TEXT"),
    ]
}

/// Look up a toolbar control by its label.
pub fn control_for_label(label: &str) -> Option<StyleControl> {
    style_controls().into_iter().find(|c| c.label == label)
}

/// Visual attributes of a custom inline style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CustomStyle {
    pub color: Option<&'static str>,
    pub background_color: Option<&'static str>,
}

/// Styles beyond the built-in bold/italic/underline/strikethrough/code.
pub fn custom_style(style: &str) -> Option<CustomStyle> {
    match style {
        "HIGHLIGHT" => Some(CustomStyle {
            background_color: Some("yellow"),
            ..CustomStyle::default()
        }),
        "RED_TEXT" => Some(CustomStyle {
            color: Some("red"),
            ..CustomStyle::default()
        }),
        _ => None,
    }
}

/// Atomic blocks render as non-editable embeds.
pub fn is_block_editable(block: &ContentBlock) -> bool {
    !block.block_type().is_atomic()
}
