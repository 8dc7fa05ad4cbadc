//! In-memory record store.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use super::{Filter, RecordStore};
use crate::error::StoreResult;
use crate::record::{Record, RecordId};

/// A record store held entirely in memory.
#[derive(Debug)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, BTreeMap<RecordId, Record>>>,
    next_id: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Number of records stored for an entity.
    pub fn count(&self, entity: &str) -> usize {
        self.tables.read().get(entity).map_or(0, BTreeMap::len)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for MemoryStore {
    fn fetch(&self, entity: &str, filter: &Filter) -> StoreResult<Vec<Record>> {
        let tables = self.tables.read();
        let Some(table) = tables.get(entity) else {
            return Ok(Vec::new());
        };

        let records = match filter {
            Filter::Id(id) => table.get(id).cloned().into_iter().collect(),
            _ => table
                .values()
                .filter(|r| filter.matches(r))
                .cloned()
                .collect(),
        };
        Ok(records)
    }

    fn save(&self, record: &mut Record) -> StoreResult<RecordId> {
        let id = match record.id {
            Some(id) => id,
            None => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                record.id = Some(id);
                id
            }
        };

        let mut stored = record.clone();
        stored.errors.clear();
        self.tables
            .write()
            .entry(record.entity.clone())
            .or_default()
            .insert(id, stored);
        Ok(id)
    }

    fn delete(&self, entity: &str, id: RecordId) -> StoreResult<bool> {
        Ok(self
            .tables
            .write()
            .get_mut(entity)
            .map_or(false, |table| table.remove(&id).is_some()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_save_assigns_ids() {
        let store = MemoryStore::new();
        let mut a = Record::new("Image");
        let mut b = Record::new("Image");

        let id_a = store.save(&mut a).unwrap();
        let id_b = store.save(&mut b).unwrap();

        assert_eq!(a.id, Some(id_a));
        assert!(id_b > id_a);
        assert_eq!(store.count("Image"), 2);
    }

    #[test]
    fn test_update_and_fetch() {
        let store = MemoryStore::new();
        let mut image = Record::new("Image");
        image.set("title", "degas");
        let id = store.save(&mut image).unwrap();

        image.set("title", "picasso");
        store.save(&mut image).unwrap();

        let found = store.find("Image", id).unwrap().unwrap();
        assert_eq!(found.get_str("title"), Some("picasso"));
        assert_eq!(store.count("Image"), 1);

        let by_title = store
            .fetch("Image", &Filter::eq("title", Value::from("picasso")))
            .unwrap();
        assert_eq!(by_title.len(), 1);
    }

    #[test]
    fn test_delete() {
        let store = MemoryStore::new();
        let mut image = Record::new("Image");
        let id = store.save(&mut image).unwrap();

        assert!(store.delete("Image", id).unwrap());
        assert!(!store.delete("Image", id).unwrap());
        assert!(store.find("Image", id).unwrap().is_none());
        assert!(store.fetch("Ghost", &Filter::All).unwrap().is_empty());
    }
}
