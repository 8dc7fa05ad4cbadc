//! Principals - the acting identities whose roles rules are checked against.

use parking_lot::RwLock;

use super::rule::{role_set, RoleSet};
use crate::record::Record;

/// An acting identity.
///
/// Roles may depend on the record (e.g. "editor of this article"), so they
/// are always resolved per record.
pub trait Principal: Send + Sync {
    /// Roles held with respect to `record`.
    fn roles_for(&self, record: &Record) -> RoleSet;

    /// Identifier used in logs.
    fn describe(&self) -> String {
        "principal".to_string()
    }
}

/// A principal holding the same roles for every record.
///
/// The role set can be swapped at runtime, which is handy for sessions
/// whose grants change.
#[derive(Debug)]
pub struct StaticPrincipal {
    id: String,
    roles: RwLock<RoleSet>,
}

impl StaticPrincipal {
    /// Create a principal with a fixed role set.
    pub fn new<I, S>(id: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            roles: RwLock::new(role_set(roles)),
        }
    }

    /// Create a principal that holds no roles.
    pub fn anonymous() -> Self {
        Self::new("anonymous", Vec::<String>::new())
    }

    /// Replace the role set.
    pub fn set_roles<I, S>(&self, roles: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.roles.write() = role_set(roles);
    }

    /// Current role set.
    pub fn roles(&self) -> RoleSet {
        self.roles.read().clone()
    }
}

impl Principal for StaticPrincipal {
    fn roles_for(&self, _record: &Record) -> RoleSet {
        self.roles()
    }

    fn describe(&self) -> String {
        self.id.clone()
    }
}

/// A principal whose roles are computed by a closure.
pub struct FnPrincipal<F> {
    id: String,
    resolve: F,
}

impl<F> FnPrincipal<F>
where
    F: Fn(&Record) -> RoleSet + Send + Sync,
{
    /// Create a closure-backed principal.
    pub fn new(id: impl Into<String>, resolve: F) -> Self {
        Self {
            id: id.into(),
            resolve,
        }
    }
}

impl<F> Principal for FnPrincipal<F>
where
    F: Fn(&Record) -> RoleSet + Send + Sync,
{
    fn roles_for(&self, record: &Record) -> RoleSet {
        (self.resolve)(record)
    }

    fn describe(&self) -> String {
        self.id.clone()
    }
}
