use std::collections::HashMap;

use diagramdb_core::{Record, RecordId, StorageBackend, StorageError};

/// In-memory mirror of the active backend, keyed by id and kept in load order.
///
/// Load order is the backend's newest-first order. The history list shows the
/// reverse of it, so records added after a load (appended at the end) appear
/// at the top.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordCache {
    order: Vec<RecordId>,
    records: HashMap<RecordId, Record>,
}

impl RecordCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the cache from `backend.get_all()`. On failure the previous
    /// contents are left as they were.
    pub fn load_from(&mut self, backend: &dyn StorageBackend) -> Result<usize, StorageError> {
        let records = backend.get_all()?;
        self.clear();
        for record in records {
            self.upsert_local(record);
        }
        tracing::debug!(count = self.len(), "Record cache loaded");
        Ok(self.len())
    }

    /// Inserts a new record at the end of load order, or replaces an existing
    /// one in place.
    pub fn upsert_local(&mut self, record: Record) {
        if self.records.insert(record.id, record.clone()).is_none() {
            self.order.push(record.id);
        }
    }

    pub fn remove_local(&mut self, id: RecordId) -> Option<Record> {
        let removed = self.records.remove(&id)?;
        self.order.retain(|existing| *existing != id);
        Some(removed)
    }

    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.records.get(&id)
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.records.contains_key(&id)
    }

    /// The first record of load order, i.e. the newest one right after a load.
    pub fn first_loaded(&self) -> Option<&Record> {
        self.order.first().and_then(|id| self.records.get(id))
    }

    /// Records as the history list shows them: reverse of load order.
    pub fn display_order(&self) -> impl Iterator<Item = &Record> + '_ {
        self.order.iter().rev().filter_map(|id| self.records.get(id))
    }

    /// Records in load order.
    pub fn snapshot(&self) -> Vec<Record> {
        self.order
            .iter()
            .filter_map(|id| self.records.get(id))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.records.clear();
    }
}
