//! Collaborator errors

use serde::{Deserialize, Serialize};

/// Common result type for collaborator operations
pub type DomainResult<T> = Result<T, DomainError>;

/// Errors reported by the remote store collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum DomainError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("Internal error: {0}")]
    Internal(String),
}
