//! Domain-level error types.

use thiserror::Error;
use uuid::Uuid;

/// Domain errors - business logic failures.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid reference: {entity_type} with id {id} does not exist")]
    InvalidReference { entity_type: &'static str, id: Uuid },

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: &'static str, id: Uuid },

    #[error("Unauthorized access")]
    Unauthorized,

    #[error("Duplicate entity: {0}")]
    Duplicate(String),

    #[error("Duplicate slug: {0}")]
    DuplicateSlug(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn post_not_found(id: Uuid) -> Self {
        Self::NotFound {
            entity_type: "Post",
            id,
        }
    }

    /// True for failures caused by the caller's input or identity;
    /// false for failures on the server side.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Storage(_) | Self::DuplicateSlug(_))
    }
}

/// Repository-level errors.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Database connection failed: {0}")]
    Connection(String),

    #[error("Query execution failed: {0}")]
    Query(String),

    #[error("Entity not found")]
    NotFound,

    #[error("Slug already taken: {0}")]
    DuplicateSlug(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

/// Storage failures surface as opaque storage errors; `NotFound` is
/// expected to be mapped to an entity-specific error by the caller first.
impl From<RepoError> for DomainError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::DuplicateSlug(slug) => DomainError::DuplicateSlug(slug),
            RepoError::Constraint(msg) => DomainError::Duplicate(msg),
            other => DomainError::Storage(other.to_string()),
        }
    }
}
