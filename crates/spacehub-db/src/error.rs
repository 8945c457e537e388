//! Store error types

use spacehub_types::CoreError;
use thiserror::Error;

/// Persistence operation errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Query error: {0}")]
    Query(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A conditional write found the row in a different state than expected
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Decode error: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(reason) | StoreError::Constraint(reason) => {
                CoreError::StateConflict { reason }
            }
            StoreError::NotFound(id) => CoreError::NotFound {
                entity: "Record",
                id,
            },
            other => CoreError::infrastructure(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_maps_to_state_conflict() {
        let core: CoreError = StoreError::Conflict("version mismatch".into()).into();
        assert!(matches!(core, CoreError::StateConflict { .. }));
    }

    #[test]
    fn test_connection_maps_to_infrastructure() {
        let core: CoreError = StoreError::Connection("refused".into()).into();
        assert!(core.is_fatal());
    }
}
