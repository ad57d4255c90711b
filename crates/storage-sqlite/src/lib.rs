//! SQLite adapters for the local connections cache.
//!
//! Implements the storage driver port over `rusqlite`, the repositories for
//! the two cached collections, the baseline schema migration and the
//! wiring that assembles a ready-to-use cache session.

pub mod cache;
pub mod connection_requests;
pub mod connections;
pub mod db;
pub mod errors;
pub mod schema;

pub use cache::open_cache_session;
pub use connection_requests::ConnectionRequestRepository;
pub use connections::ConnectionRepository;
pub use db::SqliteDriver;
pub use errors::StorageError;
