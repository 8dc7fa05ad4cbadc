//! ORMGUARD Core - Field and association restrictions for ORM records.
//!
//! Entities declare which roles may (or may not) change a field or an
//! association. Records are then bound to a principal, and every write made
//! through the binding is checked against those rules.

pub mod access;
pub mod catalog;
pub mod config;
pub mod error;
pub mod guard;
pub mod record;
pub mod security;
pub mod store;
pub mod value;

pub use access::{AssociationProxy, BoundRecord, EntryPoint, Finder, GuardedFinder};
pub use catalog::{Cardinality, EntityDef, FieldDef, RelationDef, Schema};
pub use config::{EnforcementMode, GuardConfig, DEFAULT_RESTRICTED_MESSAGE};
pub use error::{GuardError, GuardResult, StoreError, StoreResult};
pub use guard::Guard;
pub use record::{Attributes, FieldErrors, Record, RecordId};
pub use store::{Filter, MemoryStore, RecordStore, SledStore};
pub use value::Value;

// Security exports
pub use security::{
    role_set, Combinator, FnPrincipal, PermissionEvaluator, Principal, RestrictedChanges,
    RestrictionRule, RestrictionSpec, Role, RoleSet, RuleMode, RuleRegistry, RuleSet,
    StaticPrincipal,
};
