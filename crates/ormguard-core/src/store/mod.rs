//! Record storage primitives.
//!
//! The restriction engine does not own persistence; it talks to a
//! [`RecordStore`]. Two implementations ship with the crate: an in-memory
//! store and a sled-backed one.

mod memory;
mod sled_store;

pub use memory::MemoryStore;
pub use sled_store::SledStore;

use crate::error::StoreResult;
use crate::record::{Record, RecordId};
use crate::value::Value;

/// Selection of records within one entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Every record.
    All,
    /// The record with this id.
    Id(RecordId),
    /// Records with any of these ids.
    Ids(Vec<RecordId>),
    /// Records whose attribute equals the value.
    Eq(String, Value),
}

impl Filter {
    /// Attribute equality filter.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    /// Check whether a record matches.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Filter::All => true,
            Filter::Id(id) => record.id == Some(*id),
            Filter::Ids(ids) => record.id.map_or(false, |id| ids.contains(&id)),
            Filter::Eq(field, value) => record.get(field) == Some(value),
        }
    }
}

/// Storage primitives the engine delegates to.
///
/// `fetch` returns records ordered by ascending id.
pub trait RecordStore: Send + Sync {
    /// Fetch the records of `entity` matching `filter`.
    fn fetch(&self, entity: &str, filter: &Filter) -> StoreResult<Vec<Record>>;

    /// Insert or update a record, assigning an id on first save.
    fn save(&self, record: &mut Record) -> StoreResult<RecordId>;

    /// Delete a record. Returns whether it existed.
    fn delete(&self, entity: &str, id: RecordId) -> StoreResult<bool>;

    /// Fetch a single record by id.
    fn find(&self, entity: &str, id: RecordId) -> StoreResult<Option<Record>> {
        Ok(self.fetch(entity, &Filter::Id(id))?.into_iter().next())
    }
}
