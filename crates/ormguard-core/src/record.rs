//! Records, attribute maps and field errors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Identifier assigned to a record by its store.
pub type RecordId = u64;

/// A record instance of some entity.
///
/// Records are plain data; restrictions are enforced by binding a record to
/// a principal (see [`crate::access::BoundRecord`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Entity (record type) name.
    pub entity: String,
    /// Store-assigned id, `None` until first persisted.
    pub id: Option<RecordId>,
    /// Attribute values keyed by field name.
    pub attributes: BTreeMap<String, Value>,
    /// Validation errors from the last validation pass.
    #[serde(skip)]
    pub errors: FieldErrors,
}

impl Record {
    /// Create a new, unsaved record.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            id: None,
            attributes: BTreeMap::new(),
            errors: FieldErrors::default(),
        }
    }

    /// Set attributes on a fresh record.
    pub fn with_attributes(mut self, attrs: Attributes) -> Self {
        for (field, value) in attrs {
            self.attributes.insert(field, value);
        }
        self
    }

    /// Get an attribute value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }

    /// Get an attribute as a string.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    /// Set an attribute, bypassing every restriction.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(field.into(), value.into());
    }

    /// Check whether the record has been persisted.
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Check whether the last validation pass left no errors.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Short label used in logs and error messages.
    pub fn label(&self) -> String {
        match self.id {
            Some(id) => format!("{}#{}", self.entity, id),
            None => format!("{}#new", self.entity),
        }
    }
}

/// Ordered set of attribute assignments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes(Vec<(String, Value)>);

impl Attributes {
    /// Create an empty attribute set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an assignment.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.push((field.into(), value.into()));
        self
    }

    /// Field names in assignment order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(f, _)| f.as_str())
    }

    /// Number of assignments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if there are no assignments.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl IntoIterator for Attributes {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Field-level validation errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    errors: BTreeMap<String, Vec<String>>,
}

impl FieldErrors {
    /// Add an error message for a field. Adding an identical message twice
    /// is a no-op.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        let message = message.into();
        let messages = self.errors.entry(field.into()).or_default();
        if !messages.contains(&message) {
            messages.push(message);
        }
    }

    /// Messages recorded for a field.
    pub fn on(&self, field: &str) -> &[String] {
        self.errors.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Check whether a field has any errors.
    pub fn has(&self, field: &str) -> bool {
        !self.on(field).is_empty()
    }

    /// Fields carrying errors.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.errors.keys().map(String::as_str)
    }

    /// Total number of messages.
    pub fn len(&self) -> usize {
        self.errors.values().map(Vec::len).sum()
    }

    /// Check if there are no errors.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Remove every error.
    pub fn clear(&mut self) {
        self.errors.clear();
    }
}
