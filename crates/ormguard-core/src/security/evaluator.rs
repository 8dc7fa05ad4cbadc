//! Permission evaluation.

use tracing::trace;

use super::principal::Principal;
use super::registry::RuleRegistry;
use crate::error::{GuardError, GuardResult};
use crate::record::Record;

/// How several per-field decisions are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Combinator {
    /// Every field must be permitted.
    All,
    /// At least one field must be permitted.
    #[default]
    Any,
}

/// Decides whether a principal may touch fields of a record.
///
/// Decisions never fail: a field without a rule is always permitted, and a
/// principal without roles for the record is denied on every restricted
/// field.
#[derive(Debug, Clone, Copy)]
pub struct PermissionEvaluator<'a> {
    registry: &'a RuleRegistry,
}

impl<'a> PermissionEvaluator<'a> {
    /// Create an evaluator over a registry.
    pub fn new(registry: &'a RuleRegistry) -> Self {
        Self { registry }
    }

    /// Check a single field.
    pub fn is_permitted(&self, principal: &dyn Principal, record: &Record, field: &str) -> bool {
        let rules = self.registry.rules_for(&record.entity);
        let Some(rule) = rules.get(field) else {
            return true;
        };

        let roles = principal.roles_for(record);
        let permitted = rule.permits(&roles);
        trace!(
            record = %record.label(),
            field,
            principal = %principal.describe(),
            roles = ?roles,
            permitted,
            "field permission evaluated"
        );
        permitted
    }

    /// Check several fields, combining the results with `combinator`.
    ///
    /// An empty field list is a caller error.
    pub fn is_permitted_fields<S: AsRef<str>>(
        &self,
        principal: &dyn Principal,
        record: &Record,
        fields: &[S],
        combinator: Combinator,
    ) -> GuardResult<bool> {
        if fields.is_empty() {
            return Err(GuardError::EmptyFieldList);
        }

        let mut results = fields
            .iter()
            .map(|f| self.is_permitted(principal, record, f.as_ref()));
        Ok(match combinator {
            Combinator::All => results.all(|permitted| permitted),
            Combinator::Any => results.any(|permitted| permitted),
        })
    }
}
