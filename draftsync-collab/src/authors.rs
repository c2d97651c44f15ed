//! Identities seen as senders of remote updates.

use indexmap::IndexSet;

use crate::protocol::UserId;

/// Append-only, de-duplicated, insertion-ordered author list.
#[derive(Debug, Clone, Default)]
pub struct AuthorLog {
    authors: IndexSet<UserId>,
}

impl AuthorLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `user_id` was not already logged.
    pub fn record(&mut self, user_id: UserId) -> bool {
        self.authors.insert(user_id)
    }

    pub fn contains(&self, user_id: &UserId) -> bool {
        self.authors.contains(user_id)
    }

    pub fn len(&self) -> usize {
        self.authors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.authors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UserId> {
        self.authors.iter()
    }

    /// `Author: <id>` per entry, oldest first.
    pub fn display_lines(&self) -> Vec<String> {
        self.authors.iter().map(|id| format!("Author: {id}")).collect()
    }
}
