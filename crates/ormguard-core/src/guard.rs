//! The restriction engine handle.
//!
//! A [`Guard`] bundles the rule registry (and through it the schema), the
//! record store and the engine configuration. It is cheap to clone and is
//! shared by every bound record and finder it hands out.

use std::sync::Arc;

use tracing::debug;

use crate::access::{BoundRecord, EntryPoint, Finder, GuardedFinder};
use crate::catalog::{Cardinality, RelationDef, Schema};
use crate::config::GuardConfig;
use crate::error::GuardResult;
use crate::record::Record;
use crate::security::{Combinator, PermissionEvaluator, Principal, RuleRegistry};
use crate::store::{Filter, RecordStore};
use crate::value::Value;

struct GuardInner {
    registry: Arc<RuleRegistry>,
    store: Arc<dyn RecordStore>,
    config: GuardConfig,
}

/// Shared handle to the restriction engine.
#[derive(Clone)]
pub struct Guard {
    inner: Arc<GuardInner>,
}

impl Guard {
    /// Create an engine over a registry and a store.
    pub fn new(registry: Arc<RuleRegistry>, store: Arc<dyn RecordStore>, config: GuardConfig) -> Self {
        debug!(enforcement = ?config.enforcement, "restriction engine created");
        Self {
            inner: Arc::new(GuardInner {
                registry,
                store,
                config,
            }),
        }
    }

    /// The schema the registry resolves against.
    pub fn schema(&self) -> &Schema {
        self.inner.registry.schema()
    }

    /// The rule registry.
    pub fn registry(&self) -> &RuleRegistry {
        &self.inner.registry
    }

    /// The record store.
    pub fn store(&self) -> &dyn RecordStore {
        self.inner.store.as_ref()
    }

    /// The engine configuration.
    pub fn config(&self) -> &GuardConfig {
        &self.inner.config
    }

    /// A permission evaluator over this engine's registry.
    pub fn evaluator(&self) -> PermissionEvaluator<'_> {
        PermissionEvaluator::new(&self.inner.registry)
    }

    /// Check whether `principal` may change `field` on any record, bound or
    /// not.
    pub fn is_permitted(&self, principal: &dyn Principal, record: &Record, field: &str) -> bool {
        self.evaluator().is_permitted(principal, record, field)
    }

    /// Check several fields at once.
    pub fn is_permitted_fields<S: AsRef<str>>(
        &self,
        principal: &dyn Principal,
        record: &Record,
        fields: &[S],
        combinator: Combinator,
    ) -> GuardResult<bool> {
        self.evaluator()
            .is_permitted_fields(principal, record, fields, combinator)
    }

    /// Bind a record to a principal.
    pub fn bind(&self, record: Record, principal: Arc<dyn Principal>) -> BoundRecord {
        BoundRecord::new(self.clone(), record, principal)
    }

    /// The plain, unrestricted query and creation interface of an entity.
    pub fn finder(&self, entity: &str) -> GuardResult<Finder> {
        Finder::new(self.clone(), entity)
    }

    /// Entry point for acting on `entity` as `principal`.
    ///
    /// Entities without any rule (own or inherited) get the plain finder
    /// back unchanged.
    pub fn for_principal(&self, entity: &str, principal: Arc<dyn Principal>) -> GuardResult<EntryPoint> {
        let finder = self.finder(entity)?;
        if !self.registry().has_rules(entity) {
            debug!(entity, "entity has no restrictions, returning plain finder");
            return Ok(EntryPoint::Unrestricted(finder));
        }
        Ok(EntryPoint::Restricted(GuardedFinder::new(finder, principal)))
    }

    /// Run the schema validations for a record, replacing its errors.
    pub(crate) fn validate_record(&self, record: &mut Record) -> GuardResult<bool> {
        record.errors.clear();
        self.schema().validate(record)?;
        Ok(record.errors.is_empty())
    }

    /// Validate and, when valid, persist a record.
    pub(crate) fn save_record(&self, record: &mut Record) -> GuardResult<bool> {
        if !self.validate_record(record)? {
            debug!(record = %record.label(), errors = record.errors.len(), "record invalid, not saved");
            return Ok(false);
        }
        self.store().save(record)?;
        Ok(true)
    }

    /// Load the raw targets of a relation for an owning record.
    pub(crate) fn load_related(&self, owner: &Record, relation: &RelationDef) -> GuardResult<Vec<Record>> {
        match &relation.cardinality {
            Cardinality::BelongsTo => {
                let Some(id) = owner.get(&relation.foreign_key).and_then(Value::as_id) else {
                    return Ok(Vec::new());
                };
                Ok(self
                    .store()
                    .find(&relation.to_entity, id)?
                    .into_iter()
                    .collect())
            }
            Cardinality::HasOne | Cardinality::HasMany => {
                let Some(id) = owner.id else {
                    return Ok(Vec::new());
                };
                let filter = Filter::eq(relation.foreign_key.clone(), Value::id(id));
                let mut targets = self.store().fetch(&relation.to_entity, &filter)?;
                if relation.cardinality == Cardinality::HasOne {
                    targets.truncate(1);
                }
                Ok(targets)
            }
            Cardinality::HasManyThrough { through, source } => {
                let through_relation = self.schema().require_relation(&owner.entity, through)?;
                let mut targets = Vec::new();
                for intermediate in self.load_related(owner, through_relation)? {
                    let source_relation =
                        self.schema().require_relation(&intermediate.entity, source)?;
                    targets.extend(self.load_related(&intermediate, source_relation)?);
                }
                Ok(targets)
            }
        }
    }
}

impl std::fmt::Debug for Guard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Guard")
            .field("registry", &self.inner.registry)
            .field("config", &self.inner.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::EntityDef;
    use crate::security::{RestrictionSpec, StaticPrincipal};
    use crate::store::MemoryStore;

    fn guard() -> Guard {
        let schema = Schema::new()
            .with_entity(EntityDef::new("Publication").with_fields(["title"]))
            .with_entity(EntityDef::new("Article").with_fields(["title", "publication_id"]))
            .with_entity(EntityDef::new("Image").with_fields(["title", "size", "article_id"]))
            .with_relation(RelationDef::has_many("articles", "Publication", "Article", "publication_id"))
            .with_relation(RelationDef::has_many("images", "Article", "Image", "article_id"))
            .with_relation(RelationDef::belongs_to("article", "Image", "Article", "article_id"))
            .with_relation(RelationDef::has_many_through(
                "images",
                "Publication",
                "Image",
                "articles",
                "images",
            ));
        let registry = RuleRegistry::new(Arc::new(schema));
        registry
            .declare("Image", ["size"], RestrictionSpec::from_roles(["BadGuy"]))
            .unwrap();
        Guard::new(Arc::new(registry), Arc::new(MemoryStore::new()), GuardConfig::default())
    }

    fn insert(guard: &Guard, entity: &str, attrs: &[(&str, Value)]) -> Record {
        let mut record = Record::new(entity);
        for (field, value) in attrs {
            record.set(*field, value.clone());
        }
        guard.store().save(&mut record).unwrap();
        record
    }

    #[test]
    fn test_is_permitted_on_unbound_record() {
        let guard = guard();
        let user = StaticPrincipal::new("u", ["BadGuy"]);
        let image = Record::new("Image");
        assert!(!guard.is_permitted(&user, &image, "size"));
        assert!(guard.is_permitted(&user, &image, "title"));
        assert!(guard
            .is_permitted_fields(&user, &image, &["size", "title"], Combinator::Any)
            .unwrap());
    }

    #[test]
    fn test_for_principal_skips_unrestricted_entities() {
        let guard = guard();
        let user: Arc<dyn Principal> = Arc::new(StaticPrincipal::new("u", ["BadGuy"]));

        let entry = guard.for_principal("Publication", Arc::clone(&user)).unwrap();
        assert!(!entry.is_restricted());
        let entry = guard.for_principal("Image", user).unwrap();
        assert!(entry.is_restricted());
    }

    #[test]
    fn test_load_related_through() {
        let guard = guard();
        let publication = insert(&guard, "Publication", &[("title", "New York Times".into())]);
        let pub_id = Value::id(publication.id.unwrap());
        let a1 = insert(&guard, "Article", &[("publication_id", pub_id.clone())]);
        let a2 = insert(&guard, "Article", &[("publication_id", pub_id)]);
        insert(&guard, "Image", &[("article_id", Value::id(a1.id.unwrap()))]);
        insert(&guard, "Image", &[("article_id", Value::id(a2.id.unwrap()))]);
        insert(&guard, "Image", &[("article_id", Value::id(a2.id.unwrap()))]);

        let relation = guard.schema().require_relation("Publication", "images").unwrap();
        let images = guard.load_related(&publication, relation).unwrap();
        assert_eq!(images.len(), 3);

        let image = &images[0];
        let relation = guard.schema().require_relation("Image", "article").unwrap();
        let owner = guard.load_related(image, relation).unwrap();
        assert_eq!(owner[0].id, a1.id);
    }

    #[test]
    fn test_save_record_validates_first() {
        let schema = Schema::new().with_entity(
            EntityDef::new("Image").with_field(crate::catalog::FieldDef::required("title")),
        );
        let registry = RuleRegistry::new(Arc::new(schema));
        let guard = Guard::new(Arc::new(registry), Arc::new(MemoryStore::new()), GuardConfig::default());

        let mut record = Record::new("Image");
        assert!(!guard.save_record(&mut record).unwrap());
        assert!(record.id.is_none());

        record.set("title", "degas");
        assert!(guard.save_record(&mut record).unwrap());
        assert!(record.id.is_some());
    }
}
