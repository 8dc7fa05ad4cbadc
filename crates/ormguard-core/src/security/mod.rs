//! Restriction rules and their evaluation.
//!
//! - [`RestrictionRule`]: allow-list or deny-list of roles on one field
//! - [`RuleRegistry`]: rules per entity, merged down the ancestry chain
//! - [`PermissionEvaluator`]: principal + record + field -> bool
//! - [`RestrictedChanges`]: per-binding ledger of denied writes
//!
//! # Example
//!
//! ```ignore
//! use ormguard_core::security::{RestrictionSpec, RuleRegistry, StaticPrincipal};
//!
//! registry.declare("Image", ["size"], RestrictionSpec::from_roles(["BadGuy"]))?;
//!
//! let user = StaticPrincipal::new("alice", ["BadGuy"]);
//! let eval = PermissionEvaluator::new(&registry);
//! assert!(!eval.is_permitted(&user, &image, "size"));
//! ```

pub mod evaluator;
pub mod ledger;
pub mod principal;
pub mod registry;
pub mod rule;

pub use evaluator::{Combinator, PermissionEvaluator};
pub use ledger::RestrictedChanges;
pub use principal::{FnPrincipal, Principal, StaticPrincipal};
pub use registry::{RuleRegistry, RuleSet};
pub use rule::{role_set, RestrictionRule, RestrictionSpec, Role, RoleSet, RuleMode};
