//! Domain error types for ListUsers evaluation.

use thiserror::Error;

/// Domain-specific errors for ListUsers evaluation.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Authorization model not found for store during resolution.
    #[error("authorization model not found for store: {store_id}")]
    AuthorizationModelNotFound { store_id: String },

    /// Type not found in authorization model.
    #[error("type not found: {type_name}")]
    TypeNotFound { type_name: String },

    /// Relation not found on type.
    #[error("relation '{relation}' not found on type '{type_name}'")]
    RelationNotFound { type_name: String, relation: String },

    /// Storage operation failed during expansion.
    #[error("storage operation failed: {reason}")]
    StorageOperationFailed { reason: String },

    /// Relationship-graph traversal failed during the entrypoint pre-check.
    #[error("relationship graph traversal failed: {message}")]
    GraphTraversal { message: String },

    /// Invalid object format.
    #[error("invalid object format: {value}")]
    InvalidObjectFormat { value: String },

    /// Invalid user format.
    #[error("invalid user format: {value}")]
    InvalidUserFormat { value: String },

    /// Invalid relation format.
    #[error("invalid relation format: {value}")]
    InvalidRelationFormat { value: String },

    /// Invalid filter specification.
    #[error("invalid filter: {reason}")]
    InvalidFilter { reason: String },

    /// Internal resolver failure.
    #[error("resolver error: {message}")]
    ResolverError { message: String },

    /// Multiple child expansions failed; all errors are surfaced together.
    #[error("multiple expansion errors: [{}]", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<DomainError>),
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
