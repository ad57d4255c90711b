//! Error taxonomy shared across the cache crates.

use thiserror::Error;

/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Storage-level failure classes surfaced by the driver and repositories.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// A statement or query failed in the underlying engine.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// The store rejected a row (duplicate pair, self-request, etc.).
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Begin/commit/rollback misuse or failure.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Invariant breakage inside the storage layer itself.
    #[error("Internal storage error: {0}")]
    Internal(String),
}

/// Errors that can occur during cache operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A cache operation was invoked before `on_login`/`initialize` completed.
    #[error("Cache not initialized. Call initialize or on_login first.")]
    NotInitialized,

    /// A schema migration step failed; the session cannot become ready.
    #[error("Migration from schema version {from_version} failed: {message}")]
    MigrationFailed { from_version: i64, message: String },

    /// Storage error from the driver or a repository.
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Transport failure reported by the remote connections API.
    #[error("Remote fetch failed: {0}")]
    RemoteFetch(String),
}

impl Error {
    /// Create a remote fetch error from any transport message.
    pub fn remote_fetch(message: impl Into<String>) -> Self {
        Self::RemoteFetch(message.into())
    }

    /// True when the store rejected input with a constraint violation.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::Database(DatabaseError::ConstraintViolation(_)))
    }
}
