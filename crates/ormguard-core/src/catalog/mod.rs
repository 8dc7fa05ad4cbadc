//! Schema catalog for restrictable entities.
//!
//! The catalog describes entity types, their ancestry, attributes and the
//! relations between them. The restriction engine reads it for rule
//! inheritance and association traversal.

mod entity;
mod field;
mod relation;
mod schema;

pub use entity::EntityDef;
pub use field::FieldDef;
pub use relation::{Cardinality, RelationDef};
pub use schema::{Schema, BLANK_MESSAGE};
