//! Principal-scoped access to records.
//!
//! - [`BoundRecord`]: a record bound to a principal; writes are checked
//! - [`AssociationProxy`]: an association reached through a bound record
//! - [`Finder`] / [`GuardedFinder`]: per-entity query and creation
//! - [`EntryPoint`]: what the engine returns for an entity and principal

mod association;
mod bound;
mod entry;

pub use association::AssociationProxy;
pub use bound::BoundRecord;
pub use entry::{EntryPoint, Finder, GuardedFinder};
