//! Local entity cache
//!
//! Ordered list of knowledge bases plus the single "selected" entity the
//! consuming interface is focused on. All mutation funnels through
//! `upsert` / `remove` / `replace_all`. The selection is a read view: it is
//! refreshed from the canonical list entry after a merge, never set from
//! raw un-merged input, and never touched by a merge for a different id.

use kbsync_common::{KbId, KbStatus, KnowledgeBase};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Cache handle shared between the store and its pollers
pub type SharedCache = Arc<RwLock<EntityCache>>;

#[derive(Debug, Default)]
pub struct EntityCache {
    entries: Vec<KnowledgeBase>,
    selected: Option<KnowledgeBase>,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace by identifier.
    ///
    /// Replacement happens in place so insertion order is preserved. When
    /// the merged entity is the selected one, the selection is refreshed
    /// from the list entry just written.
    pub fn upsert(&mut self, kb: KnowledgeBase) {
        let id = kb.id.clone();
        match self.entries.iter().position(|e| e.id == id) {
            Some(index) => self.entries[index] = kb,
            None => self.entries.push(kb),
        }
        if self.selected.as_ref().is_some_and(|s| s.id == id) {
            self.selected = self.get(&id).cloned();
        }
    }

    /// Remove by identifier; clears the selection if it pointed at the entry
    pub fn remove(&mut self, id: &KbId) {
        self.entries.retain(|e| &e.id != id);
        if self.selected.as_ref().is_some_and(|s| &s.id == id) {
            self.selected = None;
        }
    }

    /// Replace the whole list. The selection is deliberately left untouched.
    pub fn replace_all(&mut self, entries: Vec<KnowledgeBase>) {
        self.entries = entries;
    }

    pub fn set_selected(&mut self, kb: Option<KnowledgeBase>) {
        self.selected = kb;
    }

    pub fn selected(&self) -> Option<&KnowledgeBase> {
        self.selected.as_ref()
    }

    pub fn get(&self, id: &KbId) -> Option<&KnowledgeBase> {
        self.entries.iter().find(|e| &e.id == id)
    }

    pub fn entries(&self) -> &[KnowledgeBase] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Case-insensitive substring filter over display names
    pub fn filter_by_name(&self, term: &str) -> Vec<&KnowledgeBase> {
        if term.is_empty() {
            return self.entries.iter().collect();
        }
        let needle = term.to_lowercase();
        self.entries
            .iter()
            .filter(|e| e.name.to_lowercase().contains(&needle))
            .collect()
    }

    /// Entities whose ingestion finished successfully
    pub fn ready(&self) -> Vec<&KnowledgeBase> {
        self.entries
            .iter()
            .filter(|e| e.status == KbStatus::Ready)
            .collect()
    }
}
