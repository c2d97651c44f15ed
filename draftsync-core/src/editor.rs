//! Headless editing surface: content plus selection, and the editing
//! commands a rich-text toolbar and keyboard produce.
//!
//! Every command leaves the selection pointing at valid blocks and offsets.
//! Commands that cannot apply (typing into an atomic block, selecting a
//! missing block) return an [`EditError`] and leave the state untouched.

use serde_json::{Map, Value};

use crate::block::{BlockType, CharacterMetadata, ContentBlock, InlineStyle};
use crate::content::{ContentState, Entity, Mutability};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error("Unknown block: {0}")]
    UnknownBlock(String),
    #[error("Offset {offset} outside block {key} ({len} chars)")]
    OffsetOutOfRange { key: String, offset: usize, len: usize },
    #[error("Block {0} is read-only")]
    ReadOnlyBlock(String),
}

/// Anchor/focus selection. The anchor may come after the focus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionState {
    anchor_key: String,
    anchor_offset: usize,
    focus_key: String,
    focus_offset: usize,
}

impl SelectionState {
    pub fn new(
        anchor_key: impl Into<String>,
        anchor_offset: usize,
        focus_key: impl Into<String>,
        focus_offset: usize,
    ) -> Self {
        Self {
            anchor_key: anchor_key.into(),
            anchor_offset,
            focus_key: focus_key.into(),
            focus_offset,
        }
    }

    /// A cursor at `offset` in block `key`.
    pub fn collapsed(key: impl Into<String>, offset: usize) -> Self {
        let key = key.into();
        Self::new(key.clone(), offset, key, offset)
    }

    pub fn anchor_key(&self) -> &str {
        &self.anchor_key
    }

    pub fn anchor_offset(&self) -> usize {
        self.anchor_offset
    }

    pub fn focus_key(&self) -> &str {
        &self.focus_key
    }

    pub fn focus_offset(&self) -> usize {
        self.focus_offset
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor_key == self.focus_key && self.anchor_offset == self.focus_offset
    }
}

/// Selection resolved to block indices, start before end.
#[derive(Debug, Clone, Copy)]
struct Span {
    start_block: usize,
    start_offset: usize,
    end_block: usize,
    end_offset: usize,
}

impl Span {
    fn is_collapsed(&self) -> bool {
        self.start_block == self.end_block && self.start_offset == self.end_offset
    }
}

/// Editable document state.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorState {
    content: ContentState,
    selection: SelectionState,
    /// Style to apply to the next inserted text, set by toggling a style on
    /// a collapsed selection.
    style_override: Option<InlineStyle>,
}

impl EditorState {
    pub fn create_empty() -> Self {
        Self::create_with_content(ContentState::create_empty())
    }

    /// Wrap `content` with the cursor at the start of the first block.
    pub fn create_with_content(content: ContentState) -> Self {
        let selection = SelectionState::collapsed(content.first_block().key(), 0);
        Self {
            content,
            selection,
            style_override: None,
        }
    }

    pub fn current_content(&self) -> &ContentState {
        &self.content
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn plain_text(&self) -> String {
        self.content.plain_text()
    }

    /// Replace the selection after checking that both ends exist.
    pub fn select(&mut self, selection: SelectionState) -> Result<(), EditError> {
        self.check_point(&selection.anchor_key, selection.anchor_offset)?;
        self.check_point(&selection.focus_key, selection.focus_offset)?;
        self.selection = selection;
        self.style_override = None;
        Ok(())
    }

    /// Collapse the cursor at the end of the last block.
    pub fn move_to_end(&mut self) {
        let last = self.content.last_block();
        self.selection = SelectionState::collapsed(last.key(), last.len());
        self.style_override = None;
    }

    /// Select from the start of the first block to the end of the last.
    pub fn select_all(&mut self) {
        let first = self.content.first_block();
        let last = self.content.last_block();
        self.selection = SelectionState::new(first.key(), 0, last.key(), last.len());
        self.style_override = None;
    }

    /// Type `text` over the selection. Newlines split blocks.
    pub fn insert_text(&mut self, text: &str) -> Result<(), EditError> {
        let span = self.span();
        self.ensure_editable(span.start_block)?;
        let meta = CharacterMetadata::styled(self.current_inline_style());

        let (mut block, mut offset) = self.delete_span(span);
        let mut lines = text.split('\n');
        if let Some(first) = lines.next() {
            self.content.blocks_mut()[block].insert(offset, first, &meta);
            offset += first.chars().count();
        }
        for line in lines {
            (block, offset) = self.split_at(block, offset);
            self.content.blocks_mut()[block].insert(offset, line, &meta);
            offset += line.chars().count();
        }

        self.collapse_at(block, offset);
        Ok(())
    }

    /// Split the focused block at the cursor (the Return key).
    pub fn split_block(&mut self) -> Result<(), EditError> {
        let span = self.span();
        self.ensure_editable(span.start_block)?;
        let (block, offset) = self.delete_span(span);
        let (block, offset) = self.split_at(block, offset);
        self.collapse_at(block, offset);
        Ok(())
    }

    /// Delete the selection, or the character before the cursor (Backspace).
    ///
    /// At the start of a block the block is merged into the previous one;
    /// an atomic block before the cursor is removed instead.
    pub fn delete_backward(&mut self) -> Result<(), EditError> {
        let span = self.span();
        if !span.is_collapsed() {
            let (block, offset) = self.delete_span(span);
            self.collapse_at(block, offset);
            return Ok(());
        }

        let (block, offset) = (span.start_block, span.start_offset);
        let blocks = self.content.blocks_mut();
        if blocks[block].block_type().is_atomic() {
            let key = blocks[block].key().to_string();
            blocks[block] = ContentBlock::new(key, BlockType::Unstyled, "");
            self.collapse_at(block, 0);
        } else if offset > 0 {
            blocks[block].remove(offset - 1, offset);
            self.collapse_at(block, offset - 1);
        } else if block > 0 {
            if blocks[block - 1].block_type().is_atomic() {
                blocks.remove(block - 1);
                self.collapse_at(block - 1, 0);
            } else {
                let current = blocks.remove(block);
                let joined_at = blocks[block - 1].len();
                blocks[block - 1].append(current);
                self.collapse_at(block - 1, joined_at);
            }
        }
        Ok(())
    }

    /// Toggle an inline style (`BOLD`, `HIGHLIGHT`, ...).
    ///
    /// With a collapsed selection this only changes the style of the next
    /// inserted text.
    pub fn toggle_inline_style(&mut self, style: &str) {
        let span = self.span();
        if span.is_collapsed() {
            let mut next = self.current_inline_style();
            if !next.remove(style) {
                next.insert(style.to_string());
            }
            self.style_override = Some(next);
            return;
        }

        let mut all_styled = true;
        let mut any = false;
        self.for_each_selected(span, |meta| {
            any = true;
            all_styled &= meta.style.contains(style);
        });
        let remove = any && all_styled;
        self.for_each_selected(span, |meta| {
            if remove {
                meta.style.remove(style);
            } else {
                meta.style.insert(style.to_string());
            }
        });
    }

    /// Set `block_type` on every selected block, or reset them to
    /// `unstyled` when the first one already has that type.
    pub fn toggle_block_type(&mut self, block_type: BlockType) {
        let span = self.span();
        let blocks = self.content.blocks_mut();
        let target = if *blocks[span.start_block].block_type() == block_type {
            BlockType::Unstyled
        } else {
            block_type
        };
        for block in &mut blocks[span.start_block..=span.end_block] {
            if !block.block_type().is_atomic() {
                block.set_block_type(target.clone());
            }
        }
    }

    /// Insert an atomic block holding a new entity at the cursor.
    ///
    /// The focused block is split; the atomic block goes between the two
    /// halves and the cursor lands at the start of the second half.
    pub fn insert_atomic_block(
        &mut self,
        entity_type: &str,
        mutability: Mutability,
        data: Map<String, Value>,
    ) -> Result<(), EditError> {
        let span = self.span();
        self.ensure_editable(span.start_block)?;
        let (block, offset) = self.delete_span(span);
        let entity = self
            .content
            .create_entity(Entity::new(entity_type, mutability, data));

        let (tail, _) = self.split_at(block, offset);
        let key = self.content.generate_block_key();
        let meta = CharacterMetadata {
            style: InlineStyle::new(),
            entity: Some(entity),
        };
        if let Some(atomic) = ContentBlock::with_characters(key, BlockType::Atomic, " ", vec![meta]) {
            self.content.blocks_mut().insert(tail, atomic);
        }
        self.collapse_at(tail + 1, 0);
        Ok(())
    }

    /// Style the next typed character would get.
    pub fn current_inline_style(&self) -> InlineStyle {
        if let Some(style) = &self.style_override {
            return style.clone();
        }
        let span = self.span();
        let block = &self.content.blocks()[span.start_block];
        let offset = if span.is_collapsed() && span.start_offset > 0 {
            span.start_offset - 1
        } else {
            span.start_offset
        };
        block
            .style_at(offset)
            .or_else(|| block.style_at(0))
            .cloned()
            .unwrap_or_default()
    }

    /// Type of the block holding the selection start.
    pub fn current_block_type(&self) -> &BlockType {
        self.content.blocks()[self.span().start_block].block_type()
    }

    fn check_point(&self, key: &str, offset: usize) -> Result<(), EditError> {
        let block = self
            .content
            .block_for_key(key)
            .ok_or_else(|| EditError::UnknownBlock(key.to_string()))?;
        if offset > block.len() {
            return Err(EditError::OffsetOutOfRange {
                key: key.to_string(),
                offset,
                len: block.len(),
            });
        }
        Ok(())
    }

    fn ensure_editable(&self, block: usize) -> Result<(), EditError> {
        let block = &self.content.blocks()[block];
        if block.block_type().is_atomic() {
            return Err(EditError::ReadOnlyBlock(block.key().to_string()));
        }
        Ok(())
    }

    fn resolve(&self, key: &str, offset: usize) -> (usize, usize) {
        match self.content.block_index(key) {
            Some(index) => (index, offset.min(self.content.blocks()[index].len())),
            None => (0, 0),
        }
    }

    fn span(&self) -> Span {
        let anchor = self.resolve(&self.selection.anchor_key, self.selection.anchor_offset);
        let focus = self.resolve(&self.selection.focus_key, self.selection.focus_offset);
        let (start, end) = if anchor <= focus {
            (anchor, focus)
        } else {
            (focus, anchor)
        };
        Span {
            start_block: start.0,
            start_offset: start.1,
            end_block: end.0,
            end_offset: end.1,
        }
    }

    fn collapse_at(&mut self, block: usize, offset: usize) {
        let key = self.content.blocks()[block].key().to_string();
        self.selection = SelectionState::collapsed(key, offset);
        self.style_override = None;
    }

    /// Remove the selected range, returning the resulting cursor position.
    fn delete_span(&mut self, span: Span) -> (usize, usize) {
        if span.is_collapsed() {
            return (span.start_block, span.start_offset);
        }
        let blocks = self.content.blocks_mut();
        if span.start_block == span.end_block {
            blocks[span.start_block].remove(span.start_offset, span.end_offset);
        } else {
            let start_len = blocks[span.start_block].len();
            blocks[span.start_block].remove(span.start_offset, start_len);
            let mut removed: Vec<ContentBlock> =
                blocks.drain(span.start_block + 1..=span.end_block).collect();
            // An atomic tail goes with the selection; its entity never joins text.
            if let Some(mut last) = removed.pop().filter(|b| !b.block_type().is_atomic()) {
                last.remove(0, span.end_offset);
                blocks[span.start_block].append(last);
            }
        }
        (span.start_block, span.start_offset)
    }

    /// Split block `index` at `offset`; returns the start of the new block.
    fn split_at(&mut self, index: usize, offset: usize) -> (usize, usize) {
        let key = self.content.generate_block_key();
        let blocks = self.content.blocks_mut();
        let tail = blocks[index].split_off(offset, key);
        blocks.insert(index + 1, tail);
        (index + 1, 0)
    }

    fn for_each_selected(&mut self, span: Span, mut f: impl FnMut(&mut CharacterMetadata)) {
        let blocks = self.content.blocks_mut();
        for index in span.start_block..=span.end_block {
            let block = &mut blocks[index];
            let from = if index == span.start_block { span.start_offset } else { 0 };
            let to = if index == span.end_block { span.end_offset } else { block.len() };
            for meta in &mut block.characters_mut()[from..to] {
                f(meta);
            }
        }
    }
}

impl Default for EditorState {
    fn default() -> Self {
        Self::create_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed(text: &str) -> EditorState {
        let mut editor = EditorState::create_empty();
        editor.insert_text(text).unwrap();
        editor
    }

    fn select_chars(editor: &mut EditorState, block: usize, from: usize, to: usize) {
        let key = editor.current_content().blocks()[block].key().to_string();
        editor
            .select(SelectionState::new(key.clone(), from, key, to))
            .unwrap();
    }

    #[test]
    fn test_insert_text_moves_cursor() {
        let editor = typed("Hello");
        assert_eq!(editor.plain_text(), "Hello");
        assert!(editor.selection().is_collapsed());
        assert_eq!(editor.selection().focus_offset(), 5);
    }

    #[test]
    fn test_insert_text_with_newlines_splits_blocks() {
        let editor = typed("one\ntwo\nthree");
        assert_eq!(editor.current_content().blocks().len(), 3);
        assert_eq!(editor.plain_text(), "one\ntwo\nthree");
        let last = editor.current_content().last_block();
        assert_eq!(editor.selection().focus_key(), last.key());
        assert_eq!(editor.selection().focus_offset(), 5);
    }

    #[test]
    fn test_insert_replaces_selection() {
        let mut editor = typed("Hello world");
        select_chars(&mut editor, 0, 6, 11);
        editor.insert_text("there").unwrap();
        assert_eq!(editor.plain_text(), "Hello there");
    }

    #[test]
    fn test_toggle_inline_style_on_range() {
        let mut editor = typed("Hello world");
        select_chars(&mut editor, 0, 0, 5);
        editor.toggle_inline_style("BOLD");
        let block = editor.current_content().first_block();
        assert!(block.style_at(4).unwrap().contains("BOLD"));
        assert!(!block.style_at(5).unwrap().contains("BOLD"));

        editor.toggle_inline_style("BOLD");
        let block = editor.current_content().first_block();
        assert!(block.style_at(0).unwrap().is_empty());
    }

    #[test]
    fn test_toggle_inline_style_collapsed_applies_to_next_text() {
        let mut editor = typed("plain ");
        editor.toggle_inline_style("ITALIC");
        assert!(editor.current_inline_style().contains("ITALIC"));
        editor.insert_text("slanted").unwrap();

        let block = editor.current_content().first_block();
        assert!(block.style_at(0).unwrap().is_empty());
        assert!(block.style_at(6).unwrap().contains("ITALIC"));
        // Typing continues with the style of the previous character.
        assert!(editor.current_inline_style().contains("ITALIC"));
    }

    #[test]
    fn test_toggle_block_type() {
        let mut editor = typed("Title");
        editor.toggle_block_type(BlockType::HeaderOne);
        assert_eq!(editor.current_block_type(), &BlockType::HeaderOne);
        editor.toggle_block_type(BlockType::HeaderOne);
        assert_eq!(editor.current_block_type(), &BlockType::Unstyled);
    }

    #[test]
    fn test_toggle_block_type_spans_selected_blocks() {
        let mut editor = typed("a\nb\nc");
        editor.select_all();
        editor.toggle_block_type(BlockType::UnorderedListItem);
        assert!(editor
            .current_content()
            .blocks()
            .iter()
            .all(|b| b.block_type() == &BlockType::UnorderedListItem));
    }

    #[test]
    fn test_delete_backward_merges_blocks() {
        let mut editor = typed("ab\ncd");
        let key = editor.current_content().last_block().key().to_string();
        editor.select(SelectionState::collapsed(key, 0)).unwrap();
        editor.delete_backward().unwrap();
        assert_eq!(editor.plain_text(), "abcd");
        assert_eq!(editor.selection().focus_offset(), 2);

        editor.move_to_end();
        editor.delete_backward().unwrap();
        assert_eq!(editor.plain_text(), "abc");
    }

    #[test]
    fn test_delete_across_blocks() {
        let mut editor = typed("first\nsecond\nthird");
        let blocks = editor.current_content().blocks();
        let (a, c) = (blocks[0].key().to_string(), blocks[2].key().to_string());
        editor.select(SelectionState::new(a, 2, c, 3)).unwrap();
        editor.delete_backward().unwrap();
        assert_eq!(editor.plain_text(), "fird");
        assert_eq!(editor.current_content().blocks().len(), 1);
    }

    #[test]
    fn test_delete_up_to_atomic_block_drops_it() {
        let mut editor = typed("text");
        editor
            .insert_atomic_block("IMAGE", Mutability::Immutable, Map::new())
            .unwrap();
        let blocks = editor.current_content().blocks();
        let (first, atomic) = (blocks[0].key().to_string(), blocks[1].key().to_string());

        editor
            .select(SelectionState::new(first, 2, atomic, 0))
            .unwrap();
        editor.delete_backward().unwrap();

        let content = editor.current_content();
        assert_eq!(content.blocks().len(), 2);
        assert_eq!(content.first_block().text(), "te");
        assert!(content.first_block().entity_at(1).is_none());
        assert!(content.blocks().iter().all(|b| !b.block_type().is_atomic()));
    }

    #[test]
    fn test_atomic_block_is_read_only() {
        let mut editor = typed("before");
        let mut data = Map::new();
        data.insert("src".into(), Value::from("cat.png"));
        editor
            .insert_atomic_block("IMAGE", Mutability::Immutable, data)
            .unwrap();

        let blocks = editor.current_content().blocks();
        assert_eq!(blocks.len(), 3);
        assert!(blocks[1].block_type().is_atomic());
        let entity = blocks[1].entity_at(0).unwrap();
        assert_eq!(
            editor.current_content().entity(entity).unwrap().entity_type,
            "IMAGE"
        );

        let atomic_key = blocks[1].key().to_string();
        editor
            .select(SelectionState::collapsed(atomic_key.clone(), 0))
            .unwrap();
        assert_eq!(
            editor.insert_text("x"),
            Err(EditError::ReadOnlyBlock(atomic_key))
        );
    }

    #[test]
    fn test_select_validates_points() {
        let mut editor = typed("abc");
        assert!(matches!(
            editor.select(SelectionState::collapsed("nope", 0)),
            Err(EditError::UnknownBlock(_))
        ));
        let key = editor.current_content().first_block().key().to_string();
        assert!(matches!(
            editor.select(SelectionState::collapsed(key, 10)),
            Err(EditError::OffsetOutOfRange { .. })
        ));
    }
}
