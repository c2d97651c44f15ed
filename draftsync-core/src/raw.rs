//! Raw (serializable) document form and the conversions to and from
//! [`ContentState`].
//!
//! The raw form is what travels over the wire. It stores inline styles and
//! entity references as ranges instead of per-character metadata:
//!
//! ```text
//! ContentBlock { text: "Hello", chars: [B, B, B, -, -] }
//!        │ convert_to_raw                  ▲ convert_from_raw
//!        ▼                                 │
//! RawBlock { text: "Hello", inlineStyleRanges: [{offset: 0, length: 3, style: BOLD}] }
//! ```
//!
//! `convert_to_raw` is canonical: style ranges are maximal runs ordered by
//! `(offset, style)`, entity ranges are maximal runs ordered by offset, and
//! entities are renumbered from `0` in order of first reference. This makes
//! `to_raw(from_raw(to_raw(d))) == to_raw(d)` hold for every document.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::block::{BlockType, CharacterMetadata, ContentBlock};
use crate::content::{ContentState, Entity, EntityKey, Mutability};

/// Serializable document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDraftContentState {
    pub blocks: Vec<RawBlock>,
    #[serde(default)]
    pub entity_map: BTreeMap<String, RawEntity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBlock {
    pub key: String,
    pub text: String,
    #[serde(rename = "type", default)]
    pub block_type: BlockType,
    #[serde(default)]
    pub depth: u32,
    #[serde(default)]
    pub inline_style_ranges: Vec<RawInlineStyleRange>,
    #[serde(default)]
    pub entity_ranges: Vec<RawEntityRange>,
    #[serde(default)]
    pub data: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawInlineStyleRange {
    pub offset: usize,
    pub length: usize,
    pub style: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntityRange {
    pub offset: usize,
    pub length: usize,
    pub key: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEntity {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub mutability: Mutability,
    #[serde(default)]
    pub data: Map<String, Value>,
}

/// Reasons a raw document cannot be turned into a [`ContentState`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConvertError {
    #[error("Raw content has no blocks")]
    NoBlocks,
    #[error("Duplicate block key: {0}")]
    DuplicateBlockKey(String),
    #[error("Style range {offset}+{length} outside block {block} ({len} chars)")]
    StyleRangeOutOfBounds {
        block: String,
        offset: usize,
        length: usize,
        len: usize,
    },
    #[error("Entity range {offset}+{length} outside block {block} ({len} chars)")]
    EntityRangeOutOfBounds {
        block: String,
        offset: usize,
        length: usize,
        len: usize,
    },
    #[error("Block {block} references unknown entity {key}")]
    UnknownEntity { block: String, key: u64 },
    #[error("Invalid entity map key: {0}")]
    InvalidEntityKey(String),
}

/// Convert content into its canonical raw form.
pub fn convert_to_raw(content: &ContentState) -> RawDraftContentState {
    let mut renumbered: HashMap<EntityKey, u64> = HashMap::new();
    let mut entity_map = BTreeMap::new();
    let mut blocks = Vec::with_capacity(content.blocks().len());

    for block in content.blocks() {
        let entity_ranges = entity_runs(block)
            .into_iter()
            .filter_map(|(offset, length, key)| {
                let entity = content.entity(key)?;
                let raw_key = match renumbered.get(&key) {
                    Some(k) => *k,
                    None => {
                        let k = renumbered.len() as u64;
                        renumbered.insert(key, k);
                        entity_map.insert(
                            k.to_string(),
                            RawEntity {
                                entity_type: entity.entity_type.clone(),
                                mutability: entity.mutability,
                                data: entity.data.clone(),
                            },
                        );
                        k
                    }
                };
                Some(RawEntityRange {
                    offset,
                    length,
                    key: raw_key,
                })
            })
            .collect();

        blocks.push(RawBlock {
            key: block.key().to_string(),
            text: block.text().to_string(),
            block_type: block.block_type().clone(),
            depth: block.depth(),
            inline_style_ranges: style_runs(block),
            entity_ranges,
            data: block.data().clone(),
        });
    }

    RawDraftContentState { blocks, entity_map }
}

/// Convert a raw document into editable content.
pub fn convert_from_raw(raw: &RawDraftContentState) -> Result<ContentState, ConvertError> {
    if raw.blocks.is_empty() {
        return Err(ConvertError::NoBlocks);
    }

    // Raw keys are renumbered 1.. on import; only the mapping is kept.
    let mut entities = BTreeMap::new();
    let mut imported: HashMap<u64, EntityKey> = HashMap::new();
    for (key, entity) in &raw.entity_map {
        let parsed: u64 = key
            .parse()
            .ok()
            .filter(|n: &u64| n.to_string() == *key)
            .ok_or_else(|| ConvertError::InvalidEntityKey(key.clone()))?;
        let local = EntityKey::new(imported.len() as u64 + 1);
        imported.insert(parsed, local);
        entities.insert(
            local,
            Entity::new(entity.entity_type.clone(), entity.mutability, entity.data.clone()),
        );
    }

    let mut seen_keys = HashSet::new();
    let mut blocks = Vec::with_capacity(raw.blocks.len());
    for raw_block in &raw.blocks {
        if !seen_keys.insert(raw_block.key.as_str()) {
            return Err(ConvertError::DuplicateBlockKey(raw_block.key.clone()));
        }
        blocks.push(block_from_raw(raw_block, &imported)?);
    }

    log::trace!(
        "Converted raw content: {} blocks, {} entities",
        blocks.len(),
        entities.len()
    );

    ContentState::from_parts(blocks, entities).ok_or(ConvertError::NoBlocks)
}

fn block_from_raw(
    raw: &RawBlock,
    entities: &HashMap<u64, EntityKey>,
) -> Result<ContentBlock, ConvertError> {
    let len = raw.text.chars().count();
    let mut characters = vec![CharacterMetadata::default(); len];

    for range in &raw.inline_style_ranges {
        let end = range.offset.checked_add(range.length).filter(|end| *end <= len);
        let Some(end) = end else {
            return Err(ConvertError::StyleRangeOutOfBounds {
                block: raw.key.clone(),
                offset: range.offset,
                length: range.length,
                len,
            });
        };
        for meta in &mut characters[range.offset..end] {
            meta.style.insert(range.style.clone());
        }
    }

    for range in &raw.entity_ranges {
        let end = range.offset.checked_add(range.length).filter(|end| *end <= len);
        let Some(end) = end else {
            return Err(ConvertError::EntityRangeOutOfBounds {
                block: raw.key.clone(),
                offset: range.offset,
                length: range.length,
                len,
            });
        };
        let Some(&key) = entities.get(&range.key) else {
            return Err(ConvertError::UnknownEntity {
                block: raw.key.clone(),
                key: range.key,
            });
        };
        for meta in &mut characters[range.offset..end] {
            meta.entity = Some(key);
        }
    }

    let block = ContentBlock::with_characters(
        raw.key.clone(),
        raw.block_type.clone(),
        raw.text.clone(),
        characters,
    )
    .ok_or(ConvertError::NoBlocks)?;
    Ok(block.with_depth(raw.depth).with_data(raw.data.clone()))
}

/// Maximal runs of each inline style, ordered by `(offset, style)`.
fn style_runs(block: &ContentBlock) -> Vec<RawInlineStyleRange> {
    let mut ranges = Vec::new();
    let mut open: BTreeMap<&str, usize> = BTreeMap::new();

    for (i, meta) in block.characters().iter().enumerate() {
        let closed: Vec<&str> = open
            .keys()
            .copied()
            .filter(|style| !meta.style.contains(*style))
            .collect();
        for style in closed {
            if let Some(start) = open.remove(style) {
                ranges.push(RawInlineStyleRange {
                    offset: start,
                    length: i - start,
                    style: style.to_string(),
                });
            }
        }
        for style in &meta.style {
            open.entry(style.as_str()).or_insert(i);
        }
    }
    let end = block.len();
    for (style, start) in open {
        ranges.push(RawInlineStyleRange {
            offset: start,
            length: end - start,
            style: style.to_string(),
        });
    }

    ranges.sort_by(|a, b| (a.offset, &a.style).cmp(&(b.offset, &b.style)));
    ranges
}

/// Maximal runs of the same entity: `(offset, length, key)`.
fn entity_runs(block: &ContentBlock) -> Vec<(usize, usize, EntityKey)> {
    let mut runs = Vec::new();
    let mut current: Option<(usize, EntityKey)> = None;

    for (i, meta) in block.characters().iter().enumerate() {
        match (current, meta.entity) {
            (Some((_, key)), Some(next)) if key == next => {}
            (Some((start, key)), next) => {
                runs.push((start, i - start, key));
                current = next.map(|k| (i, k));
            }
            (None, next) => current = next.map(|k| (i, k)),
        }
    }
    if let Some((start, key)) = current {
        runs.push((start, block.len() - start, key));
    }
    runs
}
