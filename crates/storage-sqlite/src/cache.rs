//! Wiring of the SQLite-backed cache session.

use std::sync::Arc;

use connect_cache_core::migrations::{Migration, MigrationRunner};
use connect_cache_core::remote::RemoteConnectionsApi;
use connect_cache_core::sync::{CacheSession, SyncEngine};
use connect_cache_core::transaction::TransactionCoordinator;

use crate::connection_requests::ConnectionRequestRepository;
use crate::connections::ConnectionRepository;
use crate::db::SqliteDriver;
use crate::schema;

/// Assemble a cache session over the given SQLite driver.
///
/// The baseline schema migration is always registered; `extra_migrations`
/// adds later steps keyed by the schema version they upgrade from.
pub fn open_cache_session(
    driver: Arc<SqliteDriver>,
    remote: Arc<dyn RemoteConnectionsApi>,
    extra_migrations: Vec<(i64, Arc<dyn Migration>)>,
) -> CacheSession {
    let tx = Arc::new(TransactionCoordinator::new(driver.clone()));

    let mut runner = MigrationRunner::new(driver.clone(), tx.clone());
    schema::register_baseline(&mut runner);
    for (from_version, step) in extra_migrations {
        runner.register(from_version, step);
    }

    let connections = Arc::new(ConnectionRepository::new(driver.clone()));
    let requests = Arc::new(ConnectionRequestRepository::new(driver));

    let engine = Arc::new(SyncEngine::new(
        remote,
        connections.clone(),
        requests.clone(),
        tx.clone(),
    ));

    CacheSession::new(runner, engine, connections, requests, tx)
}
