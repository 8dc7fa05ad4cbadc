//! Relation definitions between entities.

use serde::{Deserialize, Serialize};

/// Cardinality of a relation, seen from the owning entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    /// The owner holds the foreign key and points at a single target.
    BelongsTo,
    /// A single target holds a foreign key pointing at the owner.
    HasOne,
    /// Many targets hold a foreign key pointing at the owner.
    HasMany,
    /// Targets reached by following `through` on the owner, then `source`
    /// on each intermediate record.
    HasManyThrough {
        /// Relation on the owner leading to the intermediate records.
        through: String,
        /// Relation on the intermediate entity leading to the targets.
        source: String,
    },
}

/// A relation declared on an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDef {
    /// Relation name (unique within the owning entity).
    pub name: String,
    /// Owning entity name.
    pub from_entity: String,
    /// Target entity name.
    pub to_entity: String,
    /// Relation cardinality.
    pub cardinality: Cardinality,
    /// Foreign key attribute. Lives on the owner for `BelongsTo`, on the
    /// target for `HasOne` / `HasMany`, unused for `HasManyThrough`.
    #[serde(default)]
    pub foreign_key: String,
}

impl RelationDef {
    /// Create a belongs-to relation (`from_entity.foreign_key -> to_entity.id`).
    pub fn belongs_to(
        name: impl Into<String>,
        from_entity: impl Into<String>,
        to_entity: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            from_entity: from_entity.into(),
            to_entity: to_entity.into(),
            cardinality: Cardinality::BelongsTo,
            foreign_key: foreign_key.into(),
        }
    }

    /// Create a has-one relation (`to_entity.foreign_key -> from_entity.id`).
    pub fn has_one(
        name: impl Into<String>,
        from_entity: impl Into<String>,
        to_entity: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            from_entity: from_entity.into(),
            to_entity: to_entity.into(),
            cardinality: Cardinality::HasOne,
            foreign_key: foreign_key.into(),
        }
    }

    /// Create a has-many relation (`to_entity.foreign_key -> from_entity.id`).
    pub fn has_many(
        name: impl Into<String>,
        from_entity: impl Into<String>,
        to_entity: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            from_entity: from_entity.into(),
            to_entity: to_entity.into(),
            cardinality: Cardinality::HasMany,
            foreign_key: foreign_key.into(),
        }
    }

    /// Create a has-many-through relation.
    pub fn has_many_through(
        name: impl Into<String>,
        from_entity: impl Into<String>,
        to_entity: impl Into<String>,
        through: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            from_entity: from_entity.into(),
            to_entity: to_entity.into(),
            cardinality: Cardinality::HasManyThrough {
                through: through.into(),
                source: source.into(),
            },
            foreign_key: String::new(),
        }
    }

    /// Check if the relation yields a collection.
    pub fn is_collection(&self) -> bool {
        matches!(
            self.cardinality,
            Cardinality::HasMany | Cardinality::HasManyThrough { .. }
        )
    }

    /// Check if records can be linked or unlinked through this relation.
    pub fn is_writable(&self) -> bool {
        !matches!(self.cardinality, Cardinality::HasManyThrough { .. })
    }
}
