//! Schema - entity types, ancestry and relations.

use std::collections::HashMap;

use super::{EntityDef, FieldDef, RelationDef};
use crate::error::{GuardError, GuardResult};
use crate::record::Record;

/// Message recorded for a required field without a value.
pub const BLANK_MESSAGE: &str = "can't be blank";

/// The set of entity and relation definitions the engine works against.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    /// Entity definitions keyed by name.
    entities: HashMap<String, EntityDef>,
    /// Relation definitions, in declaration order.
    relations: Vec<RelationDef>,
}

impl Schema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity to the schema.
    pub fn with_entity(mut self, entity: EntityDef) -> Self {
        self.entities.insert(entity.name.clone(), entity);
        self
    }

    /// Add a relation to the schema.
    pub fn with_relation(mut self, relation: RelationDef) -> Self {
        self.relations.push(relation);
        self
    }

    /// Get an entity by name.
    pub fn get_entity(&self, name: &str) -> Option<&EntityDef> {
        self.entities.get(name)
    }

    /// Get an entity by name or fail with `UnknownEntity`.
    pub fn require_entity(&self, name: &str) -> GuardResult<&EntityDef> {
        self.get_entity(name)
            .ok_or_else(|| GuardError::UnknownEntity(name.to_string()))
    }

    /// List all entity names.
    pub fn entity_names(&self) -> Vec<&str> {
        self.entities.keys().map(|s| s.as_str()).collect()
    }

    /// Ancestry chain of an entity, root ancestor first and the entity
    /// itself last.
    pub fn ancestry(&self, name: &str) -> GuardResult<Vec<&EntityDef>> {
        let mut chain = Vec::new();
        let mut current = Some(name);

        while let Some(entity_name) = current {
            let entity = self.require_entity(entity_name)?;
            if chain.iter().any(|e: &&EntityDef| e.name == entity.name) {
                return Err(GuardError::Configuration(format!(
                    "entity '{}' has a cyclic parent chain",
                    name
                )));
            }
            chain.push(entity);
            current = entity.parent.as_deref();
        }

        chain.reverse();
        Ok(chain)
    }

    /// Ancestry chain as entity names, root first.
    pub fn lineage(&self, name: &str) -> GuardResult<Vec<String>> {
        Ok(self
            .ancestry(name)?
            .into_iter()
            .map(|e| e.name.clone())
            .collect())
    }

    /// Look up an attribute declared on the entity or any ancestor.
    pub fn field(&self, entity: &str, field: &str) -> GuardResult<Option<&FieldDef>> {
        Ok(self
            .ancestry(entity)?
            .into_iter()
            .rev()
            .find_map(|e| e.get_field(field)))
    }

    /// Fail with `UnknownAttribute` unless the attribute is declared.
    pub fn require_field(&self, entity: &str, field: &str) -> GuardResult<&FieldDef> {
        self.field(entity, field)?
            .ok_or_else(|| GuardError::UnknownAttribute {
                entity: entity.to_string(),
                field: field.to_string(),
            })
    }

    /// Look up a relation declared on the entity or any ancestor. The most
    /// specific declaration wins.
    pub fn relation(&self, entity: &str, name: &str) -> GuardResult<Option<&RelationDef>> {
        for ancestor in self.ancestry(entity)?.into_iter().rev() {
            if let Some(relation) = self
                .relations
                .iter()
                .find(|r| r.from_entity == ancestor.name && r.name == name)
            {
                return Ok(Some(relation));
            }
        }
        Ok(None)
    }

    /// Fail with `UnknownAssociation` unless the relation is declared.
    pub fn require_relation(&self, entity: &str, name: &str) -> GuardResult<&RelationDef> {
        self.relation(entity, name)?
            .ok_or_else(|| GuardError::UnknownAssociation {
                entity: entity.to_string(),
                name: name.to_string(),
            })
    }

    /// All relations visible on an entity, inherited ones included.
    pub fn relations_for(&self, entity: &str) -> GuardResult<Vec<&RelationDef>> {
        let mut visible: Vec<&RelationDef> = Vec::new();
        for ancestor in self.ancestry(entity)? {
            for relation in self.relations.iter().filter(|r| r.from_entity == ancestor.name) {
                visible.retain(|r| r.name != relation.name);
                visible.push(relation);
            }
        }
        Ok(visible)
    }

    /// Run the schema's own validations, adding errors to the record.
    pub fn validate(&self, record: &mut Record) -> GuardResult<()> {
        for entity in self.ancestry(&record.entity)? {
            for field in entity.fields.iter().filter(|f| f.required) {
                let blank = record.get(&field.name).map_or(true, |v| v.is_null());
                if blank {
                    record.errors.add(field.name.clone(), BLANK_MESSAGE);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Cardinality;

    fn sample_schema() -> Schema {
        Schema::new()
            .with_entity(EntityDef::new("Article").with_fields(["title", "author"]))
            .with_entity(EntityDef::subtype("SubArticle", "Article").with_fields(["teaser"]))
            .with_entity(
                EntityDef::new("Image")
                    .with_field(FieldDef::required("title"))
                    .with_fields(["size", "article_id"]),
            )
            .with_relation(RelationDef::has_many("images", "Article", "Image", "article_id"))
            .with_relation(RelationDef::belongs_to("article", "Image", "Article", "article_id"))
    }

    #[test]
    fn test_ancestry_root_first() {
        let schema = sample_schema();
        assert_eq!(schema.lineage("SubArticle").unwrap(), vec!["Article", "SubArticle"]);
        assert_eq!(schema.lineage("Image").unwrap(), vec!["Image"]);
        assert!(matches!(
            schema.lineage("Nope"),
            Err(GuardError::UnknownEntity(_))
        ));
    }

    #[test]
    fn test_cyclic_ancestry_is_rejected() {
        let schema = Schema::new()
            .with_entity(EntityDef::subtype("A", "B"))
            .with_entity(EntityDef::subtype("B", "A"));
        assert!(matches!(schema.ancestry("A"), Err(GuardError::Configuration(_))));
    }

    #[test]
    fn test_inherited_fields_and_relations() {
        let schema = sample_schema();
        assert!(schema.field("SubArticle", "title").unwrap().is_some());
        assert!(schema.field("SubArticle", "teaser").unwrap().is_some());
        assert!(schema.field("Article", "teaser").unwrap().is_none());
        assert!(schema.require_field("Image", "hack").is_err());

        let rel = schema.require_relation("SubArticle", "images").unwrap();
        assert_eq!(rel.cardinality, Cardinality::HasMany);
        assert_eq!(schema.relations_for("SubArticle").unwrap().len(), 1);
        assert!(matches!(
            schema.require_relation("Article", "authors"),
            Err(GuardError::UnknownAssociation { .. })
        ));
    }

    #[test]
    fn test_subtype_relation_overrides_parent() {
        let schema = sample_schema().with_relation(RelationDef::has_many(
            "images",
            "SubArticle",
            "Image",
            "sub_article_id",
        ));
        let relations = schema.relations_for("SubArticle").unwrap();
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].foreign_key, "sub_article_id");
    }

    #[test]
    fn test_required_validation() {
        let schema = sample_schema();
        let mut record = Record::new("Image");
        schema.validate(&mut record).unwrap();
        assert_eq!(record.errors.on("title"), [BLANK_MESSAGE.to_string()]);

        let mut record = Record::new("Image");
        record.set("title", "degas");
        schema.validate(&mut record).unwrap();
        assert!(record.is_valid());
    }
}
