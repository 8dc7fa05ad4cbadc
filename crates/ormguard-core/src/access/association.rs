//! Association proxies.
//!
//! Reads through an association are never restricted, but every record they
//! yield is bound to the owner's principal. Mutations (build, create,
//! append, replace, id assignment, removal) are checked against the rule on
//! the association itself, not against the target entity's rules.

use tracing::debug;

use super::bound::BoundRecord;
use crate::catalog::{Cardinality, RelationDef};
use crate::error::{GuardError, GuardResult};
use crate::record::{Attributes, Record, RecordId};
use crate::store::Filter;
use crate::value::Value;

/// A principal-bound view of one association of a bound record.
pub struct AssociationProxy<'a> {
    owner: &'a mut BoundRecord,
    relation: RelationDef,
}

impl<'a> AssociationProxy<'a> {
    pub(crate) fn new(owner: &'a mut BoundRecord, relation: RelationDef) -> Self {
        Self { owner, relation }
    }

    /// Association name.
    pub fn name(&self) -> &str {
        &self.relation.name
    }

    /// The relation definition behind this proxy.
    pub fn relation(&self) -> &RelationDef {
        &self.relation
    }

    /// Check whether the association carries its own restriction rule.
    /// Without one, every mutation is permitted.
    pub fn is_restricted(&self) -> bool {
        self.owner
            .guard()
            .registry()
            .rule_for(self.owner.entity(), &self.relation.name)
            .is_some()
    }

    // ---- reads -----------------------------------------------------------

    /// Every associated record, bound.
    pub fn all(&self) -> GuardResult<Vec<BoundRecord>> {
        Ok(self
            .load()?
            .into_iter()
            .map(|r| self.owner.bind_related(r))
            .collect())
    }

    /// The first associated record, bound.
    pub fn first(&self) -> GuardResult<Option<BoundRecord>> {
        Ok(self
            .load()?
            .into_iter()
            .next()
            .map(|r| self.owner.bind_related(r)))
    }

    /// The last associated record, bound.
    pub fn last(&self) -> GuardResult<Option<BoundRecord>> {
        Ok(self
            .load()?
            .into_iter()
            .last()
            .map(|r| self.owner.bind_related(r)))
    }

    /// The associated record with this id, bound.
    pub fn find_by_id(&self, id: RecordId) -> GuardResult<Option<BoundRecord>> {
        self.find_where(|r| r.id == Some(id))
            .map(|found| found.into_iter().next())
    }

    /// The first associated record whose attribute equals `value`, bound.
    pub fn find_by(&self, field: &str, value: impl Into<Value>) -> GuardResult<Option<BoundRecord>> {
        self.find_all_by(field, value)
            .map(|found| found.into_iter().next())
    }

    /// Every associated record whose attribute equals `value`, bound.
    pub fn find_all_by(&self, field: &str, value: impl Into<Value>) -> GuardResult<Vec<BoundRecord>> {
        let filter = Filter::eq(field, value);
        self.find_where(|r| filter.matches(r))
    }

    /// Every associated record matching `predicate`, bound.
    pub fn find_where<P>(&self, predicate: P) -> GuardResult<Vec<BoundRecord>>
    where
        P: Fn(&Record) -> bool,
    {
        Ok(self
            .load()?
            .into_iter()
            .filter(|r| predicate(r))
            .map(|r| self.owner.bind_related(r))
            .collect())
    }

    /// Number of associated records.
    pub fn len(&self) -> GuardResult<usize> {
        Ok(self.load()?.len())
    }

    /// Check if nothing is associated.
    pub fn is_empty(&self) -> GuardResult<bool> {
        Ok(self.len()? == 0)
    }

    // ---- mutations -------------------------------------------------------

    /// Build a new associated record (`new` in ORM parlance).
    ///
    /// The record is bound before `attrs` are applied, so its own field
    /// rules apply to the initial assignment. In ledger mode a denied build
    /// still returns the record, while the owner fails validation.
    pub fn build(&mut self, attrs: Attributes) -> GuardResult<BoundRecord> {
        self.check_mutation()?;
        self.build_unchecked(attrs)
    }

    /// Build several associated records.
    pub fn build_many(&mut self, attrs: Vec<Attributes>) -> GuardResult<Vec<BoundRecord>> {
        self.check_mutation()?;
        attrs
            .into_iter()
            .map(|a| self.build_unchecked(a))
            .collect()
    }

    /// Build and persist a new associated record. A denied create returns
    /// the built record without persisting it.
    pub fn create(&mut self, attrs: Attributes) -> GuardResult<BoundRecord> {
        let permitted = self.check_mutation()?;
        let mut record = self.build_unchecked(attrs)?;
        if permitted {
            self.persist_new(&mut record)?;
        }
        Ok(record)
    }

    /// Build and persist several associated records.
    pub fn create_many(&mut self, attrs: Vec<Attributes>) -> GuardResult<Vec<BoundRecord>> {
        let permitted = self.check_mutation()?;
        let mut created = Vec::with_capacity(attrs.len());
        for a in attrs {
            let mut record = self.build_unchecked(a)?;
            if permitted {
                self.persist_new(&mut record)?;
            }
            created.push(record);
        }
        Ok(created)
    }

    /// Add an existing record to the association (`<<`).
    pub fn append(&mut self, record: Record) -> GuardResult<()> {
        if !self.check_mutation()? {
            return Ok(());
        }
        match self.relation.cardinality {
            Cardinality::BelongsTo => self.point_owner_at(Some(record)),
            _ => {
                let owner_id = self.owner_id()?;
                self.link(record, owner_id)
            }
        }
    }

    /// Replace the association's members with `records`.
    pub fn replace(&mut self, records: Vec<Record>) -> GuardResult<()> {
        if !self.check_mutation()? {
            return Ok(());
        }
        self.replace_unchecked(records)
    }

    /// Replace the association's members with the records having `ids`.
    pub fn assign_ids(&mut self, ids: Vec<RecordId>) -> GuardResult<()> {
        if !self.check_mutation()? {
            return Ok(());
        }
        let records = self
            .owner
            .guard()
            .store()
            .fetch(&self.relation.to_entity, &Filter::Ids(ids))?;
        self.replace_unchecked(records)
    }

    /// Detach one member. Returns whether it was associated.
    pub fn remove(&mut self, id: RecordId) -> GuardResult<bool> {
        if !self.check_mutation()? {
            return Ok(false);
        }
        match self.relation.cardinality {
            Cardinality::BelongsTo => {
                let points_at = self
                    .owner
                    .get(&self.relation.foreign_key)
                    .and_then(Value::as_id);
                if points_at != Some(id) {
                    return Ok(false);
                }
                self.point_owner_at(None)?;
                Ok(true)
            }
            _ => {
                let Some(member) = self.load()?.into_iter().find(|r| r.id == Some(id)) else {
                    return Ok(false);
                };
                self.unlink(member)?;
                Ok(true)
            }
        }
    }

    /// Detach every member.
    pub fn clear(&mut self) -> GuardResult<()> {
        if !self.check_mutation()? {
            return Ok(());
        }
        self.replace_unchecked(Vec::new())
    }

    // ---- plumbing --------------------------------------------------------

    fn load(&self) -> GuardResult<Vec<Record>> {
        self.owner
            .guard()
            .load_related(self.owner.record(), &self.relation)
    }

    /// Check the association rule, applying the enforcement mode on denial.
    /// Returns whether the mutation is permitted.
    fn check_mutation(&mut self) -> GuardResult<bool> {
        if !self.relation.is_writable() {
            return Err(GuardError::ReadOnlyAssociation {
                entity: self.owner.entity().to_string(),
                name: self.relation.name.clone(),
            });
        }
        if self.owner.is_permitted(&self.relation.name) {
            return Ok(true);
        }
        let name = self.relation.name.clone();
        self.owner.deny(&name)?;
        Ok(false)
    }

    fn owner_id(&self) -> GuardResult<RecordId> {
        self.owner
            .id()
            .ok_or_else(|| GuardError::NotPersisted(self.owner.record().label()))
    }

    fn build_unchecked(&mut self, attrs: Attributes) -> GuardResult<BoundRecord> {
        let mut record = Record::new(self.relation.to_entity.clone());
        if !matches!(self.relation.cardinality, Cardinality::BelongsTo) {
            if let Some(owner_id) = self.owner.id() {
                record.set(self.relation.foreign_key.clone(), Value::id(owner_id));
            }
        }

        let mut bound = self.owner.bind_related(record);
        bound.assign_attributes(attrs)?;
        Ok(bound)
    }

    fn persist_new(&mut self, record: &mut BoundRecord) -> GuardResult<()> {
        if !record.save()? {
            return Ok(());
        }
        match self.relation.cardinality {
            Cardinality::BelongsTo => {
                let target = record.id().map(Value::id).unwrap_or(Value::Null);
                self.owner
                    .record_mut()
                    .set(self.relation.foreign_key.clone(), target);
            }
            Cardinality::HasOne => self.detach_others(record.id())?,
            _ => {}
        }
        debug!(
            owner = %self.owner.record().label(),
            association = %self.relation.name,
            created = %record.record().label(),
            "associated record created"
        );
        Ok(())
    }

    fn replace_unchecked(&mut self, records: Vec<Record>) -> GuardResult<()> {
        if matches!(self.relation.cardinality, Cardinality::BelongsTo) {
            return self.point_owner_at(records.into_iter().next());
        }

        let owner_id = self.owner_id()?;
        let incoming = records
            .into_iter()
            .map(|r| self.prepare_member(r, owner_id))
            .collect::<GuardResult<Vec<_>>>()?;

        let keep: Vec<RecordId> = incoming.iter().filter_map(|r| r.id).collect();
        for current in self.load()? {
            if !current.id.map_or(false, |id| keep.contains(&id)) {
                self.unlink(current)?;
            }
        }
        for mut record in incoming {
            self.persist_member(&mut record, "record linked")?;
        }
        Ok(())
    }

    fn link(&mut self, record: Record, owner_id: RecordId) -> GuardResult<()> {
        let mut record = self.prepare_member(record, owner_id)?;
        if self.relation.cardinality == Cardinality::HasOne {
            self.detach_others(record.id)?;
        }
        self.persist_member(&mut record, "record linked")
    }

    /// Reject records of another entity tree.
    fn check_target(&self, record: &Record) -> GuardResult<()> {
        let lineage = self.owner.guard().schema().lineage(&record.entity)?;
        if lineage.contains(&self.relation.to_entity) {
            return Ok(());
        }
        Err(GuardError::AssociationTypeMismatch {
            association: self.relation.name.clone(),
            expected: self.relation.to_entity.clone(),
            found: record.entity.clone(),
        })
    }

    /// Point a prospective member at the owner and validate it, without
    /// writing anything.
    fn prepare_member(&self, mut record: Record, owner_id: RecordId) -> GuardResult<Record> {
        self.check_target(&record)?;
        record.set(self.relation.foreign_key.clone(), Value::id(owner_id));
        if !self.owner.guard().validate_record(&mut record)? {
            return Err(invalid(&record));
        }
        Ok(record)
    }

    fn persist_member(&self, record: &mut Record, event: &str) -> GuardResult<()> {
        if !self.owner.guard().save_record(record)? {
            return Err(invalid(record));
        }
        debug!(
            owner = %self.owner.record().label(),
            association = %self.relation.name,
            member = %record.label(),
            "{}", event
        );
        Ok(())
    }

    /// A has-one owner points at a single target: unlink every other record
    /// carrying the owner's key. The store is queried directly since reads
    /// through the relation only ever see one target.
    fn detach_others(&mut self, keep: Option<RecordId>) -> GuardResult<()> {
        let Some(owner_id) = self.owner.id() else {
            return Ok(());
        };
        let filter = Filter::eq(self.relation.foreign_key.clone(), Value::id(owner_id));
        let linked = self
            .owner
            .guard()
            .store()
            .fetch(&self.relation.to_entity, &filter)?;
        for current in linked {
            if current.id != keep {
                self.unlink(current)?;
            }
        }
        Ok(())
    }

    fn unlink(&mut self, mut record: Record) -> GuardResult<()> {
        record.set(self.relation.foreign_key.clone(), Value::Null);
        self.persist_member(&mut record, "record unlinked")
    }

    fn point_owner_at(&mut self, target: Option<Record>) -> GuardResult<()> {
        let value = match target {
            Some(mut record) => {
                self.check_target(&record)?;
                if record.id.is_none() && !self.owner.guard().save_record(&mut record)? {
                    return Err(invalid(&record));
                }
                record.id.map(Value::id).unwrap_or(Value::Null)
            }
            None => Value::Null,
        };
        let foreign_key = self.relation.foreign_key.clone();
        self.owner.record_mut().set(foreign_key, value);
        Ok(())
    }
}

fn invalid(record: &Record) -> GuardError {
    GuardError::InvalidRecord {
        record: record.label(),
        fields: record.errors.fields().map(str::to_string).collect(),
    }
}

impl std::fmt::Debug for AssociationProxy<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssociationProxy")
            .field("owner", &self.owner.record().label())
            .field("relation", &self.relation.name)
            .finish()
    }
}
