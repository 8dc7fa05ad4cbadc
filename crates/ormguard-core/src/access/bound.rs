//! Principal-bound records.

use std::sync::Arc;

use tracing::{debug, warn};

use super::association::AssociationProxy;
use crate::config::EnforcementMode;
use crate::error::{GuardError, GuardResult};
use crate::guard::Guard;
use crate::record::{Attributes, FieldErrors, Record, RecordId};
use crate::security::{Combinator, Principal, RestrictedChanges};
use crate::value::Value;

/// A record bound to the principal acting on it.
///
/// Every attribute write goes through the permission evaluator and every
/// association is reached through an [`AssociationProxy`] whose results are
/// bound to the same principal. Denied writes are ledgered or rejected
/// according to the engine's [`EnforcementMode`].
pub struct BoundRecord {
    guard: Guard,
    principal: Arc<dyn Principal>,
    record: Record,
    ledger: RestrictedChanges,
}

fn same_principal(a: &Arc<dyn Principal>, b: &Arc<dyn Principal>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

impl BoundRecord {
    pub(crate) fn new(guard: Guard, record: Record, principal: Arc<dyn Principal>) -> Self {
        debug!(
            record = %record.label(),
            principal = %principal.describe(),
            "record bound"
        );
        Self {
            guard,
            principal,
            record,
            ledger: RestrictedChanges::new(),
        }
    }

    /// Bind to `principal`. Rebinding to the principal already bound keeps
    /// the binding as is; a different principal replaces it and starts a
    /// fresh ledger.
    pub fn rebind(self, principal: Arc<dyn Principal>) -> Self {
        if same_principal(&self.principal, &principal) {
            return self;
        }
        Self::new(self.guard, self.record, principal)
    }

    /// The underlying record.
    pub fn record(&self) -> &Record {
        &self.record
    }

    /// Unwrap the record, dropping the binding.
    pub fn into_record(self) -> Record {
        self.record
    }

    /// The bound principal.
    pub fn principal(&self) -> &Arc<dyn Principal> {
        &self.principal
    }

    /// Fields denied since the record was bound.
    pub fn restricted_changes(&self) -> &RestrictedChanges {
        &self.ledger
    }

    /// The engine this record is bound through.
    pub fn guard(&self) -> &Guard {
        &self.guard
    }

    /// Entity name.
    pub fn entity(&self) -> &str {
        &self.record.entity
    }

    /// Store-assigned id.
    pub fn id(&self) -> Option<RecordId> {
        self.record.id
    }

    /// Read an attribute. Reads are never restricted.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.record.get(field)
    }

    /// Read an attribute as a string.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.record.get_str(field)
    }

    /// Errors from the last validation pass.
    pub fn errors(&self) -> &FieldErrors {
        &self.record.errors
    }

    /// Check whether the bound principal may change `field`.
    pub fn is_permitted(&self, field: &str) -> bool {
        self.guard
            .is_permitted(self.principal.as_ref(), &self.record, field)
    }

    /// Check several fields at once.
    pub fn is_permitted_fields<S: AsRef<str>>(
        &self,
        fields: &[S],
        combinator: Combinator,
    ) -> GuardResult<bool> {
        self.guard
            .is_permitted_fields(self.principal.as_ref(), &self.record, fields, combinator)
    }

    /// Assign an attribute if the principal is permitted to.
    ///
    /// A denied write is skipped and ledgered, or fails with
    /// `PermissionDenied` in fail-fast mode.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> GuardResult<()> {
        self.guard.schema().require_field(&self.record.entity, field)?;

        if self.is_permitted(field) {
            self.record.set(field, value);
            return Ok(());
        }
        self.deny(field)
    }

    /// Assign several attributes.
    ///
    /// Unknown attributes are rejected before anything is written. In
    /// fail-fast mode every field is checked up front so a denial leaves the
    /// record untouched.
    pub fn assign_attributes(&mut self, attrs: Attributes) -> GuardResult<()> {
        for field in attrs.fields() {
            self.guard.schema().require_field(&self.record.entity, field)?;
        }

        if self.guard.config().enforcement == EnforcementMode::FailFast {
            if let Some(field) = attrs.fields().find(|f| !self.is_permitted(f)) {
                let field = field.to_string();
                return self.deny(&field);
            }
        }

        for (field, value) in attrs {
            self.set(&field, value)?;
        }
        Ok(())
    }

    /// Assign attributes and save.
    pub fn update(&mut self, attrs: Attributes) -> GuardResult<bool> {
        self.assign_attributes(attrs)?;
        self.save()
    }

    /// Assign one attribute and save.
    pub fn update_attribute(&mut self, field: &str, value: impl Into<Value>) -> GuardResult<bool> {
        self.set(field, value)?;
        self.save()
    }

    /// Run validations: the schema's own checks, then the restricted-change
    /// hook surfacing every ledgered field.
    pub fn validate(&mut self) -> GuardResult<bool> {
        self.guard.validate_record(&mut self.record)?;
        let message = &self.guard.config().restricted_message;
        self.ledger.surface(&mut self.record.errors, message);
        Ok(self.record.errors.is_empty())
    }

    /// Validate and persist. Returns `false`, without writing, when the
    /// record is invalid.
    pub fn save(&mut self) -> GuardResult<bool> {
        if !self.validate()? {
            debug!(
                record = %self.record.label(),
                errors = self.record.errors.len(),
                "bound record invalid, not saved"
            );
            return Ok(false);
        }
        self.guard.store().save(&mut self.record)?;
        Ok(true)
    }

    /// Reload attributes from the store. The binding and ledger are kept.
    pub fn reload(&mut self) -> GuardResult<()> {
        let Some(id) = self.record.id else {
            return Err(GuardError::NotPersisted(self.record.label()));
        };
        let stored = self
            .guard
            .store()
            .find(&self.record.entity, id)?
            .ok_or_else(|| crate::error::StoreError::NotFound {
                entity: self.record.entity.clone(),
                id,
            })?;
        self.record.attributes = stored.attributes;
        Ok(())
    }

    /// Delete the record from the store.
    pub fn destroy(self) -> GuardResult<bool> {
        match self.record.id {
            Some(id) => Ok(self.guard.store().delete(&self.record.entity, id)?),
            None => Ok(false),
        }
    }

    /// Reach an association. Every record read through it is bound to this
    /// record's principal; mutations are checked against the association's
    /// own rule.
    pub fn association(&mut self, name: &str) -> GuardResult<AssociationProxy<'_>> {
        let relation = self
            .guard
            .schema()
            .require_relation(&self.record.entity, name)?
            .clone();
        Ok(AssociationProxy::new(self, relation))
    }

    /// Replace an association's members by id (the `image_ids =` path).
    pub fn set_association_ids(&mut self, name: &str, ids: Vec<RecordId>) -> GuardResult<()> {
        self.association(name)?.assign_ids(ids)
    }

    /// Bind another record to this record's principal.
    pub(crate) fn bind_related(&self, record: Record) -> BoundRecord {
        self.guard.bind(record, Arc::clone(&self.principal))
    }

    /// Apply the enforcement mode to a denied write on `field`.
    pub(crate) fn deny(&mut self, field: &str) -> GuardResult<()> {
        let mode = self.guard.config().enforcement;
        warn!(
            record = %self.record.label(),
            field,
            principal = %self.principal.describe(),
            mode = ?mode,
            "restricted change denied"
        );
        match mode {
            EnforcementMode::Ledger => {
                self.ledger.record(field);
                Ok(())
            }
            EnforcementMode::FailFast => Err(GuardError::PermissionDenied {
                entity: self.record.entity.clone(),
                field: field.to_string(),
            }),
        }
    }

    /// Raw access for association plumbing (foreign keys are governed by
    /// the association rule, not the attribute rules).
    pub(crate) fn record_mut(&mut self) -> &mut Record {
        &mut self.record
    }
}

impl std::fmt::Debug for BoundRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundRecord")
            .field("record", &self.record)
            .field("principal", &self.principal.describe())
            .field("ledger", &self.ledger)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{EntityDef, FieldDef, Schema};
    use crate::config::GuardConfig;
    use crate::security::{RestrictionSpec, RuleRegistry, StaticPrincipal};
    use crate::store::MemoryStore;

    fn guard(config: GuardConfig) -> Guard {
        let schema = Schema::new().with_entity(
            EntityDef::new("Image")
                .with_field(FieldDef::required("title"))
                .with_fields(["size", "format", "mime_type"]),
        );
        let registry = RuleRegistry::new(Arc::new(schema));
        registry
            .declare("Image", ["size"], RestrictionSpec::from_roles(["BadGuy"]))
            .unwrap();
        registry
            .declare(
                "Image",
                ["format", "mime_type"],
                RestrictionSpec::to_roles(["Superhero", "NiceGuy"]),
            )
            .unwrap();
        Guard::new(Arc::new(registry), Arc::new(MemoryStore::new()), config)
    }

    fn image() -> Record {
        let mut record = Record::new("Image");
        record.set("title", "picasso");
        record.set("size", 3);
        record
    }

    #[test]
    fn test_ledger_mode_skips_and_reports() {
        let guard = guard(GuardConfig::default());
        let user = Arc::new(StaticPrincipal::new("u", ["BadGuy"]));
        let mut bound = guard.bind(image(), user);

        bound.set("size", 12).unwrap();
        assert_eq!(bound.get("size"), Some(&Value::Int(3)));
        assert!(bound.restricted_changes().contains("size"));

        assert!(!bound.validate().unwrap());
        assert_eq!(
            bound.errors().on("size"),
            ["is restricted from the current user".to_string()]
        );

        // Validating again does not duplicate the error.
        assert!(!bound.validate().unwrap());
        assert_eq!(bound.errors().on("size").len(), 1);
        assert!(!bound.save().unwrap());
        assert!(bound.id().is_none());
    }

    #[test]
    fn test_fail_fast_mode_rejects() {
        let guard = guard(GuardConfig::fail_fast());
        let user = Arc::new(StaticPrincipal::new("u", ["BadGuy"]));
        let mut bound = guard.bind(image(), user);

        let err = bound.set("size", 12).unwrap_err();
        assert!(matches!(err, GuardError::PermissionDenied { ref field, .. } if field == "size"));
        assert_eq!(bound.get("size"), Some(&Value::Int(3)));
        assert!(bound.restricted_changes().is_empty());
        assert!(bound.validate().unwrap());
    }

    #[test]
    fn test_unrestricted_and_permitted_writes() {
        let guard = guard(GuardConfig::default());
        let user = Arc::new(StaticPrincipal::new("u", ["BadGuy"]));
        let mut bound = guard.bind(image(), user.clone());

        bound.update(Attributes::new().with("title", "woo")).unwrap();
        assert!(bound.errors().is_empty());
        assert_eq!(bound.get_str("title"), Some("woo"));

        user.set_roles(["NiceGuy"]);
        assert!(bound.update(Attributes::new().with("format", "jpeg")).unwrap());
        assert!(bound.errors().on("format").is_empty());
        assert_eq!(bound.get_str("format"), Some("jpeg"));
    }

    #[test]
    fn test_unknown_attribute_rejected() {
        let guard = guard(GuardConfig::default());
        let user = Arc::new(StaticPrincipal::new("u", ["NiceGuy"]));
        let mut bound = guard.bind(image(), user);

        assert!(matches!(
            bound.set("hack", 1),
            Err(GuardError::UnknownAttribute { .. })
        ));
        assert!(matches!(
            bound.assign_attributes(Attributes::new().with("title", "x").with("hack", 1)),
            Err(GuardError::UnknownAttribute { .. })
        ));
        assert_eq!(bound.get_str("title"), Some("picasso"));
    }

    #[test]
    fn test_fail_fast_bulk_assignment_is_all_or_nothing() {
        let guard = guard(GuardConfig::fail_fast());
        let user = Arc::new(StaticPrincipal::new("u", ["BadGuy"]));
        let mut bound = guard.bind(image(), user);

        let attrs = Attributes::new().with("title", "changed").with("mime_type", "image/png");
        assert!(bound.assign_attributes(attrs).is_err());
        assert_eq!(bound.get_str("title"), Some("picasso"));
    }

    #[test]
    fn test_rebind_semantics() {
        let guard = guard(GuardConfig::default());
        let bad: Arc<dyn Principal> = Arc::new(StaticPrincipal::new("bad", ["BadGuy"]));
        let nice: Arc<dyn Principal> = Arc::new(StaticPrincipal::new("nice", ["NiceGuy"]));

        let mut bound = guard.bind(image(), Arc::clone(&bad));
        bound.set("size", 12).unwrap();
        assert_eq!(bound.restricted_changes().len(), 1);

        let bound = bound.rebind(Arc::clone(&bad));
        assert_eq!(bound.restricted_changes().len(), 1);

        let mut bound = bound.rebind(nice);
        assert!(bound.restricted_changes().is_empty());
        bound.set("size", 12).unwrap();
        assert_eq!(bound.get("size"), Some(&Value::Int(12)));
    }

    #[test]
    fn test_update_attribute_saves_and_reloads() {
        let guard = guard(GuardConfig::default());
        let user = Arc::new(StaticPrincipal::new("u", ["NiceGuy"]));
        let mut bound = guard.bind(image(), user);

        assert!(bound.update_attribute("format", "gif").unwrap());
        let id = bound.id().unwrap();

        bound.record_mut().set("format", "scratch");
        bound.reload().unwrap();
        assert_eq!(bound.get_str("format"), Some("gif"));

        assert!(bound.destroy().unwrap());
        assert!(guard.store().find("Image", id).unwrap().is_none());
    }

    #[test]
    fn test_permission_queries() {
        let guard = guard(GuardConfig::default());
        let user = Arc::new(StaticPrincipal::new("u", ["BadGuy"]));
        let bound = guard.bind(image(), user);

        assert!(!bound.is_permitted("size"));
        assert!(bound.is_permitted("title"));
        assert!(bound
            .is_permitted_fields(&["hack1", "mime_type"], Combinator::Any)
            .unwrap());
        assert!(!bound
            .is_permitted_fields(&["hack1", "mime_type"], Combinator::All)
            .unwrap());
    }
}
