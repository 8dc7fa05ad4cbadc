//! Restriction rules.
//!
//! A rule is either an allow-list (`to`) or a deny-list (`from`) of roles
//! attached to one field of one entity.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{GuardError, GuardResult};

/// Role identifier.
pub type Role = String;

/// Set of roles a principal holds for a record.
pub type RoleSet = BTreeSet<Role>;

/// Build a role set from anything string-like.
pub fn role_set<I, S>(roles: I) -> RoleSet
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    roles.into_iter().map(Into::into).collect()
}

/// How a rule's role list is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleMode {
    /// Only the listed roles may touch the field.
    Allow,
    /// Everyone except the listed roles may touch the field.
    Deny,
}

/// A restriction declaration as written by the caller: exactly one of
/// `to` / `from` must be present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestrictionSpec {
    /// Roles the field is restricted to.
    #[serde(default)]
    pub to: Option<Vec<Role>>,
    /// Roles the field is restricted from.
    #[serde(default)]
    pub from: Option<Vec<Role>>,
}

impl RestrictionSpec {
    /// Restrict the field to the given roles.
    pub fn to_roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            to: Some(roles.into_iter().map(Into::into).collect()),
            from: None,
        }
    }

    /// Restrict the field from the given roles.
    pub fn from_roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            to: None,
            from: Some(roles.into_iter().map(Into::into).collect()),
        }
    }
}

/// A validated, immutable restriction rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestrictionRule {
    mode: RuleMode,
    roles: RoleSet,
}

impl RestrictionRule {
    /// Create an allow-list rule.
    pub fn allow<I, S>(roles: I) -> GuardResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(RuleMode::Allow, role_set(roles))
    }

    /// Create a deny-list rule.
    pub fn deny<I, S>(roles: I) -> GuardResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(RuleMode::Deny, role_set(roles))
    }

    fn new(mode: RuleMode, roles: RoleSet) -> GuardResult<Self> {
        if roles.is_empty() {
            return Err(GuardError::Configuration(
                "a restriction needs at least one role".to_string(),
            ));
        }
        Ok(Self { mode, roles })
    }

    /// The rule mode.
    pub fn mode(&self) -> RuleMode {
        self.mode
    }

    /// The listed roles.
    pub fn roles(&self) -> &RoleSet {
        &self.roles
    }

    /// Decide whether a principal holding `held` passes this rule.
    ///
    /// Holding no roles at all never passes, not even a deny-list.
    pub fn permits(&self, held: &RoleSet) -> bool {
        if held.is_empty() {
            return false;
        }
        let listed = held.iter().any(|role| self.roles.contains(role));
        match self.mode {
            RuleMode::Allow => listed,
            RuleMode::Deny => !listed,
        }
    }
}

impl TryFrom<RestrictionSpec> for RestrictionRule {
    type Error = GuardError;

    fn try_from(spec: RestrictionSpec) -> GuardResult<Self> {
        match (spec.to, spec.from) {
            (Some(to), None) => Self::allow(to),
            (None, Some(from)) => Self::deny(from),
            (Some(_), Some(_)) => Err(GuardError::Configuration(
                "provide either a 'to' or 'from' role list, but not both".to_string(),
            )),
            (None, None) => Err(GuardError::Configuration(
                "either a 'to' or 'from' role list is required".to_string(),
            )),
        }
    }
}
