use crate::models::JournalEntry;
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Unloaded,
    LoadedEmpty,
    Loaded,
}

/// Interactive-side view of every stored entry, kept newest first.
///
/// Only a full `load_all` makes the cache valid. Entries added to a cache
/// that was never loaded are kept, but the cache still reports itself
/// invalid so the next read goes to the store.
#[derive(Debug, Default)]
pub struct EntryCache {
    entries: HashMap<i64, JournalEntry>,
    ordered_ids: Vec<i64>,
    loaded: bool,
}

impl EntryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CacheState {
        match (self.loaded, self.entries.is_empty()) {
            (false, _) => CacheState::Unloaded,
            (true, true) => CacheState::LoadedEmpty,
            (true, false) => CacheState::Loaded,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.loaded
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn load_all(&mut self, entries: Vec<JournalEntry>) {
        self.entries.clear();
        for entry in entries {
            self.entries.insert(entry.id, entry);
        }
        self.loaded = true;
        self.reorder();
    }

    pub fn add_entry(&mut self, entry: JournalEntry) {
        self.entries.insert(entry.id, entry);
        self.reorder();
    }

    pub fn get_all_ordered(&self) -> Vec<JournalEntry> {
        self.ordered_ids
            .iter()
            .filter_map(|id| self.entries.get(id))
            .cloned()
            .collect()
    }

    pub fn get_by_id(&self, id: i64) -> Option<&JournalEntry> {
        self.entries.get(&id)
    }

    pub fn invalidate(&mut self) {
        self.entries.clear();
        self.ordered_ids.clear();
        self.loaded = false;
    }

    fn reorder(&mut self) {
        let mut ids = self.entries.keys().copied().collect::<Vec<_>>();
        ids.sort_by(|left, right| match (self.entries.get(left), self.entries.get(right)) {
            (Some(left), Some(right)) => canonical_order(left, right),
            _ => Ordering::Equal,
        });
        self.ordered_ids = ids;
    }
}

/// Newest first: timestamp descending, then id descending.
pub fn canonical_order(left: &JournalEntry, right: &JournalEntry) -> Ordering {
    right
        .timestamp
        .cmp(&left.timestamp)
        .then_with(|| right.id.cmp(&left.id))
}
