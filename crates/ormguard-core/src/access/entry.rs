//! Entity entry points: plain finders and principal-scoped finders.

use std::sync::Arc;

use tracing::debug;

use super::bound::BoundRecord;
use crate::error::GuardResult;
use crate::guard::Guard;
use crate::record::{Attributes, Record, RecordId};
use crate::security::Principal;
use crate::store::Filter;
use crate::value::Value;

/// The plain query and creation interface of one entity.
///
/// Nothing it returns is bound; it is what callers get back for entities
/// that carry no restrictions.
#[derive(Debug, Clone)]
pub struct Finder {
    guard: Guard,
    entity: String,
}

impl Finder {
    pub(crate) fn new(guard: Guard, entity: &str) -> GuardResult<Self> {
        guard.schema().require_entity(entity)?;
        Ok(Self {
            guard,
            entity: entity.to_string(),
        })
    }

    /// Entity name.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// The record with this id.
    pub fn find_by_id(&self, id: RecordId) -> GuardResult<Option<Record>> {
        Ok(self.guard.store().find(&self.entity, id)?)
    }

    /// The record with the lowest id.
    pub fn first(&self) -> GuardResult<Option<Record>> {
        Ok(self.all()?.into_iter().next())
    }

    /// The record with the highest id.
    pub fn last(&self) -> GuardResult<Option<Record>> {
        Ok(self.all()?.into_iter().last())
    }

    /// Every record of the entity, in id order.
    pub fn all(&self) -> GuardResult<Vec<Record>> {
        Ok(self.guard.store().fetch(&self.entity, &Filter::All)?)
    }

    /// The first record whose attribute equals `value`.
    pub fn find_by(&self, field: &str, value: impl Into<Value>) -> GuardResult<Option<Record>> {
        Ok(self.find_all_by(field, value)?.into_iter().next())
    }

    /// Every record whose attribute equals `value`.
    pub fn find_all_by(&self, field: &str, value: impl Into<Value>) -> GuardResult<Vec<Record>> {
        Ok(self
            .guard
            .store()
            .fetch(&self.entity, &Filter::eq(field, value))?)
    }

    /// Every record matching `predicate`.
    pub fn find_where<P>(&self, predicate: P) -> GuardResult<Vec<Record>>
    where
        P: Fn(&Record) -> bool,
    {
        Ok(self.all()?.into_iter().filter(|r| predicate(r)).collect())
    }

    /// Construct a record without persisting it.
    pub fn build(&self, attrs: Attributes) -> GuardResult<Record> {
        for field in attrs.fields() {
            self.guard.schema().require_field(&self.entity, field)?;
        }
        Ok(Record::new(self.entity.clone()).with_attributes(attrs))
    }

    /// Construct and persist a record. The record comes back unsaved, with
    /// its errors filled in, if validation fails.
    pub fn create(&self, attrs: Attributes) -> GuardResult<Record> {
        let mut record = self.build(attrs)?;
        self.guard.save_record(&mut record)?;
        Ok(record)
    }

    /// Validate and persist a record of this entity.
    pub fn save(&self, record: &mut Record) -> GuardResult<bool> {
        self.guard.save_record(record)
    }
}

/// A finder whose every result is bound to a principal.
#[derive(Clone)]
pub struct GuardedFinder {
    finder: Finder,
    principal: Arc<dyn Principal>,
}

impl GuardedFinder {
    pub(crate) fn new(finder: Finder, principal: Arc<dyn Principal>) -> Self {
        debug!(
            entity = %finder.entity(),
            principal = %principal.describe(),
            "guarded finder created"
        );
        Self { finder, principal }
    }

    /// Entity name.
    pub fn entity(&self) -> &str {
        self.finder.entity()
    }

    /// The principal every result is bound to.
    pub fn principal(&self) -> &Arc<dyn Principal> {
        &self.principal
    }

    fn bind(&self, record: Record) -> BoundRecord {
        self.finder.guard.bind(record, Arc::clone(&self.principal))
    }

    fn bind_all(&self, records: Vec<Record>) -> Vec<BoundRecord> {
        records.into_iter().map(|r| self.bind(r)).collect()
    }

    /// The record with this id, bound.
    pub fn find_by_id(&self, id: RecordId) -> GuardResult<Option<BoundRecord>> {
        Ok(self.finder.find_by_id(id)?.map(|r| self.bind(r)))
    }

    /// The record with the lowest id, bound.
    pub fn first(&self) -> GuardResult<Option<BoundRecord>> {
        Ok(self.finder.first()?.map(|r| self.bind(r)))
    }

    /// The record with the highest id, bound.
    pub fn last(&self) -> GuardResult<Option<BoundRecord>> {
        Ok(self.finder.last()?.map(|r| self.bind(r)))
    }

    /// Every record of the entity, bound.
    pub fn all(&self) -> GuardResult<Vec<BoundRecord>> {
        Ok(self.bind_all(self.finder.all()?))
    }

    /// The first record whose attribute equals `value`, bound.
    pub fn find_by(&self, field: &str, value: impl Into<Value>) -> GuardResult<Option<BoundRecord>> {
        Ok(self.finder.find_by(field, value)?.map(|r| self.bind(r)))
    }

    /// Every record whose attribute equals `value`, bound.
    pub fn find_all_by(&self, field: &str, value: impl Into<Value>) -> GuardResult<Vec<BoundRecord>> {
        Ok(self.bind_all(self.finder.find_all_by(field, value)?))
    }

    /// Every record matching `predicate`, bound.
    pub fn find_where<P>(&self, predicate: P) -> GuardResult<Vec<BoundRecord>>
    where
        P: Fn(&Record) -> bool,
    {
        Ok(self.bind_all(self.finder.find_where(predicate)?))
    }

    /// Construct a bound record. The record is bound before `attrs` are
    /// applied, so the initial assignment is checked field by field.
    pub fn build(&self, attrs: Attributes) -> GuardResult<BoundRecord> {
        let mut record = self.bind(Record::new(self.finder.entity.clone()));
        record.assign_attributes(attrs)?;
        Ok(record)
    }

    /// Construct, bind and save. A record that fails validation, including
    /// one with ledgered denials, comes back unsaved with its errors set.
    pub fn create(&self, attrs: Attributes) -> GuardResult<BoundRecord> {
        let mut record = self.build(attrs)?;
        record.save()?;
        Ok(record)
    }
}

impl std::fmt::Debug for GuardedFinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardedFinder")
            .field("entity", &self.finder.entity)
            .field("principal", &self.principal.describe())
            .finish()
    }
}

/// What [`Guard::for_principal`] hands back.
#[derive(Debug, Clone)]
pub enum EntryPoint {
    /// The entity has no restrictions; results are plain records.
    Unrestricted(Finder),
    /// Results are bound to the principal.
    Restricted(GuardedFinder),
}

impl EntryPoint {
    /// Check whether results are bound to the principal.
    pub fn is_restricted(&self) -> bool {
        matches!(self, EntryPoint::Restricted(_))
    }

    /// Entity name.
    pub fn entity(&self) -> &str {
        match self {
            EntryPoint::Unrestricted(finder) => finder.entity(),
            EntryPoint::Restricted(finder) => finder.entity(),
        }
    }

    /// The guarded finder, if the entity is restricted.
    pub fn into_restricted(self) -> Option<GuardedFinder> {
        match self {
            EntryPoint::Restricted(finder) => Some(finder),
            EntryPoint::Unrestricted(_) => None,
        }
    }

    /// The plain finder, if the entity is unrestricted.
    pub fn into_unrestricted(self) -> Option<Finder> {
        match self {
            EntryPoint::Unrestricted(finder) => Some(finder),
            EntryPoint::Restricted(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{EntityDef, FieldDef, Schema};
    use crate::config::GuardConfig;
    use crate::error::GuardError;
    use crate::security::{RestrictionSpec, RuleRegistry, StaticPrincipal};
    use crate::store::MemoryStore;

    fn guard(config: GuardConfig) -> Guard {
        let schema = Schema::new()
            .with_entity(
                EntityDef::new("Image")
                    .with_field(FieldDef::required("title"))
                    .with_fields(["size"]),
            )
            .with_entity(EntityDef::new("Note").with_fields(["body"]));
        let registry = RuleRegistry::new(Arc::new(schema));
        registry
            .declare("Image", ["size"], RestrictionSpec::from_roles(["BadGuy"]))
            .unwrap();
        Guard::new(Arc::new(registry), Arc::new(MemoryStore::new()), config)
    }

    fn principal(role: &str) -> Arc<dyn Principal> {
        Arc::new(StaticPrincipal::new("u", [role]))
    }

    #[test]
    fn test_plain_finder() {
        let guard = guard(GuardConfig::default());
        let notes = guard.finder("Note").unwrap();
        let note = notes.create(Attributes::new().with("body", "hi")).unwrap();
        assert!(note.is_persisted());

        assert_eq!(notes.all().unwrap().len(), 1);
        assert_eq!(notes.find_by("body", "hi").unwrap().unwrap().id, note.id);
        assert!(matches!(
            notes.build(Attributes::new().with("nope", 1)),
            Err(GuardError::UnknownAttribute { .. })
        ));
        assert!(guard.finder("Ghost").is_err());
    }

    #[test]
    fn test_guarded_create_checks_initial_attributes() {
        let guard = guard(GuardConfig::default());
        let images = guard
            .for_principal("Image", principal("BadGuy"))
            .unwrap()
            .into_restricted()
            .unwrap();

        let image = images
            .create(Attributes::new().with("title", "degas").with("size", 3))
            .unwrap();
        assert!(image.id().is_none());
        assert_eq!(image.get("size"), None);
        assert!(image.errors().has("size"));

        let image = images.create(Attributes::new().with("title", "degas")).unwrap();
        assert!(image.id().is_some());
    }

    #[test]
    fn test_guarded_create_fail_fast() {
        let guard = guard(GuardConfig::fail_fast());
        let images = guard
            .for_principal("Image", principal("BadGuy"))
            .unwrap()
            .into_restricted()
            .unwrap();

        let err = images
            .build(Attributes::new().with("title", "degas").with("size", 3))
            .unwrap_err();
        assert!(matches!(err, GuardError::PermissionDenied { .. }));
        assert!(guard.finder("Image").unwrap().all().unwrap().is_empty());
    }

    #[test]
    fn test_guarded_finders_bind_results() {
        let guard = guard(GuardConfig::default());
        let plain = guard.finder("Image").unwrap();
        for title in ["degas", "monet"] {
            plain.create(Attributes::new().with("title", title)).unwrap();
        }

        let images = guard
            .for_principal("Image", principal("BadGuy"))
            .unwrap()
            .into_restricted()
            .unwrap();
        let mut last = images.last().unwrap().unwrap();
        assert_eq!(last.get_str("title"), Some("monet"));
        last.set("size", 5).unwrap();
        assert!(!last.save().unwrap());

        let first = images.first().unwrap().unwrap();
        assert!(!first.is_permitted("size"));
        let found = images.find_by_id(first.id().unwrap()).unwrap().unwrap();
        assert_eq!(found.get_str("title"), Some("degas"));
        assert_eq!(images.all().unwrap().len(), 2);
        assert_eq!(images.find_where(|r| r.get_str("title") == Some("monet")).unwrap().len(), 1);
    }

    #[test]
    fn test_unrestricted_entry_point() {
        let guard = guard(GuardConfig::default());
        let entry = guard.for_principal("Note", principal("BadGuy")).unwrap();
        assert_eq!(entry.entity(), "Note");
        assert!(!entry.is_restricted());
        assert!(entry.into_unrestricted().is_some());
    }
}
