//! Core error types.

use thiserror::Error;

/// Errors raised by the restriction engine.
#[derive(Debug, Error)]
pub enum GuardError {
    /// A restriction rule or configuration document is malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A write or association mutation was denied in fail-fast mode.
    #[error("permission denied: {entity}.{field} is restricted from the current user")]
    PermissionDenied {
        /// Entity owning the field.
        entity: String,
        /// Field or association name.
        field: String,
    },

    /// The entity is not declared in the schema.
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    /// The attribute is not declared on the entity or its ancestors.
    #[error("unknown attribute: {entity}.{field}")]
    UnknownAttribute {
        /// Entity name.
        entity: String,
        /// Attribute name.
        field: String,
    },

    /// The association is not declared on the entity or its ancestors.
    #[error("unknown association: {entity}.{name}")]
    UnknownAssociation {
        /// Entity name.
        entity: String,
        /// Association name.
        name: String,
    },

    /// Mutation attempted on an association that cannot be written through.
    #[error("association {entity}.{name} is read-only")]
    ReadOnlyAssociation {
        /// Entity name.
        entity: String,
        /// Association name.
        name: String,
    },

    /// A record of the wrong entity was handed to an association.
    #[error("association {association} holds {expected} records, got {found}")]
    AssociationTypeMismatch {
        /// Association name.
        association: String,
        /// Target entity of the association.
        expected: String,
        /// Entity of the rejected record.
        found: String,
    },

    /// A record linked through an association failed validation.
    #[error("{record} is invalid: {fields:?}")]
    InvalidRecord {
        /// Record label.
        record: String,
        /// Fields carrying errors.
        fields: Vec<String>,
    },

    /// The owning record must be persisted before its collection can change.
    #[error("{0} must be saved before its associations can be modified")]
    NotPersisted(String),

    /// A multi-field permission check was given no field names.
    #[error("permission check requires at least one field name")]
    EmptyFieldList,

    /// Underlying store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors raised by record stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Sled storage error.
    #[error("storage error: {0}")]
    Sled(#[from] sled::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Record not found.
    #[error("record not found: {entity}#{id}")]
    NotFound {
        /// Entity name.
        entity: String,
        /// Record id.
        id: u64,
    },

    /// Stored key could not be decoded.
    #[error("invalid key format")]
    InvalidKey,
}

/// Result type for engine operations.
pub type GuardResult<T> = Result<T, GuardError>;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
