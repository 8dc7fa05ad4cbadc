//! Field definitions for entities.

use serde::{Deserialize, Serialize};

/// An attribute definition within an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field name.
    pub name: String,
    /// Whether a non-null value is required for the record to validate.
    #[serde(default)]
    pub required: bool,
}

impl FieldDef {
    /// Create an optional field.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
        }
    }

    /// Create a required field.
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
        }
    }
}
