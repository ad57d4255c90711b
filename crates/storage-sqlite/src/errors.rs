//! Storage-layer errors and their mapping into the core taxonomy.

use connect_cache_core::{DatabaseError, Error};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("storage lock poisoned")]
    LockPoisoned,
}

impl From<StorageError> for Error {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::Sqlite(err) if is_constraint_violation(&err) => {
                Error::Database(DatabaseError::ConstraintViolation(err.to_string()))
            }
            StorageError::Sqlite(err) => Error::Database(DatabaseError::QueryFailed(err.to_string())),
            StorageError::LockPoisoned => {
                Error::Database(DatabaseError::Internal("storage lock poisoned".to_string()))
            }
        }
    }
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(code, _)
            if code.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
