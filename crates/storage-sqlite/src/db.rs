//! SQLite adapter for the storage driver port.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};

use connect_cache_core::store::{RunResult, SqlRow, SqlValue, StorageDriver};
use connect_cache_core::Result;

use crate::errors::StorageError;

/// Storage driver backed by a single rusqlite connection.
///
/// One connection, guarded by a mutex, is deliberate: the cache is
/// single-writer and the transaction coordinator's active-transaction
/// invariant relies on every statement going through the same connection.
pub struct SqliteDriver {
    conn: Mutex<Connection>,
}

impl SqliteDriver {
    /// Open (or create) the database file with WAL mode and foreign keys on.
    pub fn open(path: &Path) -> std::result::Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> std::result::Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::result::Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

fn to_sqlite(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(v) => Value::Integer(*v),
        SqlValue::Real(v) => Value::Real(*v),
        SqlValue::Text(v) => Value::Text(v.clone()),
        SqlValue::Blob(v) => Value::Blob(v.clone()),
    }
}

fn from_sqlite(value: Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(v) => SqlValue::Integer(v),
        Value::Real(v) => SqlValue::Real(v),
        Value::Text(v) => SqlValue::Text(v),
        Value::Blob(v) => SqlValue::Blob(v),
    }
}

#[async_trait]
impl StorageDriver for SqliteDriver {
    async fn execute(&self, sql: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(sql).map_err(StorageError::from)?;
        Ok(())
    }

    async fn run(&self, sql: &str, params: &[SqlValue]) -> Result<RunResult> {
        let conn = self.lock()?;
        let rows_affected = conn
            .execute(sql, params_from_iter(params.iter().map(to_sqlite)))
            .map_err(StorageError::from)?;
        Ok(RunResult {
            rows_affected,
            last_insert_id: conn.last_insert_rowid(),
        })
    }

    async fn query_all(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<SqlRow>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql).map_err(StorageError::from)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let mut rows = stmt
            .query(params_from_iter(params.iter().map(to_sqlite)))
            .map_err(StorageError::from)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(StorageError::from)? {
            let mut values = HashMap::with_capacity(columns.len());
            for (idx, name) in columns.iter().enumerate() {
                let value: Value = row.get(idx).map_err(StorageError::from)?;
                values.insert(name.clone(), from_sqlite(value));
            }
            out.push(SqlRow::new(values));
        }
        Ok(out)
    }

    async fn query_first(&self, sql: &str, params: &[SqlValue]) -> Result<Option<SqlRow>> {
        Ok(self.query_all(sql, params).await?.into_iter().next())
    }

    async fn schema_version(&self) -> Result<i64> {
        let conn = self.lock()?;
        let version = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .map_err(StorageError::from)?;
        Ok(version)
    }

    async fn set_schema_version(&self, version: i64) -> Result<()> {
        let conn = self.lock()?;
        // PRAGMA values cannot be bound as parameters.
        conn.execute_batch(&format!("PRAGMA user_version = {version}"))
            .map_err(StorageError::from)?;
        Ok(())
    }
}
