//! Document content: ordered blocks plus the entity map they reference.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::block::{BlockType, ContentBlock};

/// Key of an entity inside a [`ContentState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey(u64);

impl EntityKey {
    pub(crate) fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How an entity's text behaves under editing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mutability {
    Mutable,
    Immutable,
    Segmented,
}

/// Metadata attached to a run of characters (links, images, embeds).
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub entity_type: String,
    pub mutability: Mutability,
    pub data: Map<String, Value>,
}

impl Entity {
    pub fn new(entity_type: impl Into<String>, mutability: Mutability, data: Map<String, Value>) -> Self {
        Self {
            entity_type: entity_type.into(),
            mutability,
            data,
        }
    }
}

/// Full document content.
///
/// Always holds at least one block.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentState {
    blocks: Vec<ContentBlock>,
    entities: BTreeMap<EntityKey, Entity>,
    next_entity: u64,
}

impl ContentState {
    /// A document with a single empty unstyled block.
    pub fn create_empty() -> Self {
        Self {
            blocks: vec![ContentBlock::new(generate_key(&HashSet::new()), BlockType::Unstyled, "")],
            entities: BTreeMap::new(),
            next_entity: 1,
        }
    }

    /// A document with one unstyled block per line of `text`.
    pub fn create_from_text(text: &str) -> Self {
        let mut taken = HashSet::new();
        let blocks = text
            .split('\n')
            .map(|line| {
                let key = generate_key(&taken);
                taken.insert(key.clone());
                ContentBlock::new(key, BlockType::Unstyled, line)
            })
            .collect();
        Self {
            blocks,
            entities: BTreeMap::new(),
            next_entity: 1,
        }
    }

    /// Build content from already-validated parts.
    ///
    /// Returns `None` for an empty block list.
    pub(crate) fn from_parts(
        blocks: Vec<ContentBlock>,
        entities: BTreeMap<EntityKey, Entity>,
    ) -> Option<Self> {
        if blocks.is_empty() {
            return None;
        }
        let next_entity = entities.keys().next_back().map_or(1, |k| k.0 + 1);
        Some(Self {
            blocks,
            entities,
            next_entity,
        })
    }

    pub fn blocks(&self) -> &[ContentBlock] {
        &self.blocks
    }

    pub fn first_block(&self) -> &ContentBlock {
        &self.blocks[0]
    }

    pub fn last_block(&self) -> &ContentBlock {
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn block_for_key(&self, key: &str) -> Option<&ContentBlock> {
        self.blocks.iter().find(|b| b.key() == key)
    }

    pub fn block_index(&self, key: &str) -> Option<usize> {
        self.blocks.iter().position(|b| b.key() == key)
    }

    pub fn entity(&self, key: EntityKey) -> Option<&Entity> {
        self.entities.get(&key)
    }

    pub fn entities(&self) -> impl Iterator<Item = (EntityKey, &Entity)> {
        self.entities.iter().map(|(k, e)| (*k, e))
    }

    /// Register a new entity and return its key.
    pub fn create_entity(&mut self, entity: Entity) -> EntityKey {
        let key = EntityKey(self.next_entity);
        self.next_entity += 1;
        self.entities.insert(key, entity);
        key
    }

    /// Block texts joined with newlines.
    pub fn plain_text(&self) -> String {
        self.blocks
            .iter()
            .map(ContentBlock::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn has_text(&self) -> bool {
        self.blocks.len() > 1 || !self.blocks[0].is_empty()
    }

    /// A block key not used by any block in this document.
    pub fn generate_block_key(&self) -> String {
        let taken: HashSet<String> = self.blocks.iter().map(|b| b.key().to_string()).collect();
        generate_key(&taken)
    }

    pub(crate) fn blocks_mut(&mut self) -> &mut Vec<ContentBlock> {
        &mut self.blocks
    }
}

impl Default for ContentState {
    fn default() -> Self {
        Self::create_empty()
    }
}

/// Five hex chars from a fresh v4 UUID, retried until unused.
fn generate_key(taken: &HashSet<String>) -> String {
    loop {
        let simple = Uuid::new_v4().simple().to_string();
        let key = simple[..5].to_string();
        if !taken.contains(&key) {
            return key;
        }
    }
}
