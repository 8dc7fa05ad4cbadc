//! ORMGUARD - Role-based field and association restrictions for ORM records.
//!
//! This crate bundles the restriction engine with a [`GuardBuilder`] that
//! wires a schema, its rules, the engine configuration and a record store
//! into a ready [`Guard`].
//!
//! # Example
//!
//! ```ignore
//! use ormguard::prelude::*;
//!
//! let schema = Schema::new()
//!     .with_entity(EntityDef::new("Image").with_fields(["title", "size"]));
//!
//! let guard = GuardBuilder::new(schema)
//!     .restrict("Image", ["size"], RestrictionSpec::from_roles(["BadGuy"]))
//!     .build()?;
//!
//! let user: Arc<dyn Principal> = Arc::new(StaticPrincipal::new("alice", ["BadGuy"]));
//! if let EntryPoint::Restricted(images) = guard.for_principal("Image", user)? {
//!     let image = images.create(Attributes::new().with("title", "degas").with("size", 3))?;
//!     assert!(image.errors().has("size"));
//! }
//! ```

mod builder;

pub use builder::GuardBuilder;
pub use ormguard_core::*;

/// Everything needed to declare rules and act on records.
pub mod prelude {
    pub use std::sync::Arc;

    pub use crate::builder::GuardBuilder;
    pub use ormguard_core::{
        Attributes, BoundRecord, Cardinality, Combinator, EnforcementMode, EntityDef, EntryPoint,
        FieldDef, FnPrincipal, Guard, GuardConfig, GuardError, GuardResult, MemoryStore,
        Principal, Record, RecordStore, RelationDef, RestrictionSpec, Schema, SledStore,
        StaticPrincipal, Value,
    };
}
