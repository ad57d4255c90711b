//! Baseline cache schema, registered as migration version 0.

use std::sync::Arc;

use connect_cache_core::migrations::{Migration, MigrationRunner, SqlMigration};

pub const CREATE_CONNECTIONS_TABLE_SQL: &str = "\
CREATE TABLE IF NOT EXISTS connections (
    connection_id        INTEGER PRIMARY KEY,
    user_id1             TEXT NOT NULL,
    user_id1_username    TEXT,
    user_id1_first_name  TEXT,
    user_id1_last_name   TEXT,
    user_id1_image_url   TEXT,
    user_id2             TEXT NOT NULL,
    user_id2_username    TEXT,
    user_id2_first_name  TEXT,
    user_id2_last_name   TEXT,
    user_id2_image_url   TEXT,
    connected_at         INTEGER NOT NULL,
    UNIQUE(user_id1, user_id2),
    CHECK(user_id1 < user_id2)
);";

pub const CREATE_CONNECTION_REQUESTS_TABLE_SQL: &str = "\
CREATE TABLE IF NOT EXISTS connection_requests (
    request_id           INTEGER PRIMARY KEY,
    requester_id         TEXT NOT NULL,
    requester_username   TEXT,
    requester_first_name TEXT,
    requester_last_name  TEXT,
    requester_image_url  TEXT,
    receiver_id          TEXT NOT NULL,
    receiver_username    TEXT,
    receiver_first_name  TEXT,
    receiver_last_name   TEXT,
    receiver_image_url   TEXT,
    greeting_text        TEXT,
    status               TEXT NOT NULL DEFAULT 'pending',
    created_at           INTEGER NOT NULL,
    responded_at         INTEGER,
    CHECK(requester_id != receiver_id),
    CHECK(status IN ('pending', 'accepted', 'rejected', 'canceled'))
);";

pub const CREATE_CONNECTIONS_INDEXES_SQL: &str = "\
CREATE INDEX IF NOT EXISTS idx_connections_user_id1 ON connections(user_id1);
CREATE INDEX IF NOT EXISTS idx_connections_user_id2 ON connections(user_id2);
CREATE INDEX IF NOT EXISTS idx_connections_connected_at ON connections(connected_at);";

pub const CREATE_CONNECTION_REQUESTS_INDEXES_SQL: &str = "\
CREATE INDEX IF NOT EXISTS idx_connection_requests_requester_id
    ON connection_requests(requester_id);
CREATE INDEX IF NOT EXISTS idx_connection_requests_receiver_id
    ON connection_requests(receiver_id);
CREATE INDEX IF NOT EXISTS idx_connection_requests_status
    ON connection_requests(status);
CREATE INDEX IF NOT EXISTS idx_connection_requests_created_at
    ON connection_requests(created_at);
CREATE UNIQUE INDEX IF NOT EXISTS idx_connection_requests_pending_pair
    ON connection_requests(requester_id, receiver_id) WHERE status = 'pending';";

/// The version-0 step creating both tables and their indexes.
pub fn baseline_migration() -> Arc<dyn Migration> {
    Arc::new(SqlMigration::new([
        CREATE_CONNECTIONS_TABLE_SQL,
        CREATE_CONNECTION_REQUESTS_TABLE_SQL,
        CREATE_CONNECTIONS_INDEXES_SQL,
        CREATE_CONNECTION_REQUESTS_INDEXES_SQL,
    ]))
}

/// Register the baseline schema on a runner. Host applications register
/// their own steps for later versions on top of this.
pub fn register_baseline(runner: &mut MigrationRunner) {
    runner.register(0, baseline_migration());
}
