//! Sled-backed record store.
//!
//! Records live in a single tree keyed by `entity:` followed by the
//! big-endian id, so a prefix scan yields an entity's records in id order.

use tracing::{debug, instrument};

use super::{Filter, RecordStore};
use crate::error::{StoreError, StoreResult};
use crate::record::{Record, RecordId};

const RECORD_TREE_NAME: &[u8] = b"ormguard:records";

/// A record store persisted in sled.
pub struct SledStore {
    db: sled::Db,
    tree: sled::Tree,
}

impl SledStore {
    /// Open the store inside an existing sled database.
    pub fn open(db: &sled::Db) -> StoreResult<Self> {
        let tree = db.open_tree(RECORD_TREE_NAME)?;
        Ok(Self {
            db: db.clone(),
            tree,
        })
    }

    /// Open a throwaway store that is removed when dropped.
    pub fn temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::open(&db)
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> StoreResult<()> {
        self.tree.flush()?;
        Ok(())
    }

    fn key_prefix(entity: &str) -> Vec<u8> {
        let mut key = entity.as_bytes().to_vec();
        key.push(b':');
        key
    }

    fn key(entity: &str, id: RecordId) -> Vec<u8> {
        let mut key = Self::key_prefix(entity);
        key.extend_from_slice(&id.to_be_bytes());
        key
    }

    fn id_from_key(prefix_len: usize, key: &[u8]) -> StoreResult<RecordId> {
        let bytes: [u8; 8] = key
            .get(prefix_len..)
            .and_then(|b| b.try_into().ok())
            .ok_or(StoreError::InvalidKey)?;
        Ok(RecordId::from_be_bytes(bytes))
    }

    fn serialize_record(record: &Record) -> StoreResult<Vec<u8>> {
        serde_json::to_vec(record).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn deserialize_record(bytes: &[u8]) -> StoreResult<Record> {
        serde_json::from_slice(bytes).map_err(|e| StoreError::Deserialization(e.to_string()))
    }
}

impl RecordStore for SledStore {
    fn fetch(&self, entity: &str, filter: &Filter) -> StoreResult<Vec<Record>> {
        if let Filter::Id(id) = filter {
            return match self.tree.get(Self::key(entity, *id))? {
                Some(bytes) => Ok(vec![Self::deserialize_record(&bytes)?]),
                None => Ok(Vec::new()),
            };
        }

        let prefix = Self::key_prefix(entity);
        let mut records = Vec::new();
        for result in self.tree.scan_prefix(&prefix) {
            let (key, value) = result?;
            let mut record = Self::deserialize_record(&value)?;
            record.id = Some(Self::id_from_key(prefix.len(), &key)?);
            if filter.matches(&record) {
                records.push(record);
            }
        }
        Ok(records)
    }

    #[instrument(skip(self, record), fields(entity = %record.entity))]
    fn save(&self, record: &mut Record) -> StoreResult<RecordId> {
        let id = match record.id {
            Some(id) => id,
            None => {
                let id = self.db.generate_id()? + 1;
                record.id = Some(id);
                id
            }
        };

        let value = Self::serialize_record(record)?;
        self.tree.insert(Self::key(&record.entity, id), value)?;
        debug!(id, "record saved");
        Ok(id)
    }

    fn delete(&self, entity: &str, id: RecordId) -> StoreResult<bool> {
        let removed = self.tree.remove(Self::key(entity, id))?;
        Ok(removed.is_some())
    }
}

impl std::fmt::Debug for SledStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledStore")
            .field("records", &self.tree.len())
            .finish()
    }
}
