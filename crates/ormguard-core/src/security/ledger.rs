//! Restricted-change ledger.

use crate::record::FieldErrors;

/// Fields whose write was denied since the record was bound.
///
/// Surfaced as field errors during validation when the engine runs in
/// ledger mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestrictedChanges {
    fields: Vec<String>,
}

impl RestrictedChanges {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a denied field. Recording the same field twice is a no-op.
    pub fn record(&mut self, field: impl Into<String>) {
        let field = field.into();
        if !self.fields.contains(&field) {
            self.fields.push(field);
        }
    }

    /// Check whether a field was denied.
    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    /// Denied fields in the order they were first recorded.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }

    /// Number of denied fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if nothing was denied.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Validation hook: add `message` on every denied field unless the
    /// identical error is already present.
    pub fn surface(&self, errors: &mut FieldErrors, message: &str) {
        for field in &self.fields {
            errors.add(field.clone(), message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_dedupes() {
        let mut ledger = RestrictedChanges::new();
        ledger.record("size");
        ledger.record("format");
        ledger.record("size");

        assert_eq!(ledger.len(), 2);
        assert!(ledger.contains("size"));
        assert!(!ledger.contains("title"));
        assert_eq!(ledger.fields().collect::<Vec<_>>(), vec!["size", "format"]);
    }

    #[test]
    fn test_surface_is_idempotent() {
        let mut ledger = RestrictedChanges::new();
        ledger.record("size");

        let mut errors = FieldErrors::default();
        ledger.surface(&mut errors, "is restricted from the current user");
        ledger.surface(&mut errors, "is restricted from the current user");

        assert_eq!(errors.on("size").len(), 1);
        assert_eq!(errors.len(), 1);
    }
}
