//! Core domain, ports and services for the local connections cache.
//!
//! The cache is a disposable read replica of two backend-owned collections
//! (connections and connection requests): the backend is always
//! authoritative, and consistency is maintained through periodic full
//! resynchronization rather than incremental diffing. This crate holds the
//! entity models, the storage and remote ports, the migration runner, the
//! transaction coordinator, the sync engine and the session lifecycle
//! controller; `connect-cache-storage-sqlite` provides the SQLite-backed
//! adapters.

pub mod connections;
pub mod errors;
pub mod migrations;
pub mod remote;
pub mod store;
pub mod sync;
pub mod transaction;

pub use errors::{DatabaseError, Error, Result};
