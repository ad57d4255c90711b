//! Storage driver port: the minimal capability surface the cache needs from
//! an embedded SQL engine.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::errors::{DatabaseError, Result};

/// A single SQL parameter or column value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Option<i64>> for SqlValue {
    fn from(value: Option<i64>) -> Self {
        value.map_or(Self::Null, Self::Integer)
    }
}

impl From<Option<String>> for SqlValue {
    fn from(value: Option<String>) -> Self {
        value.map_or(Self::Null, Self::Text)
    }
}

impl From<&Option<String>> for SqlValue {
    fn from(value: &Option<String>) -> Self {
        value.as_ref().map_or(Self::Null, |v| Self::Text(v.clone()))
    }
}

/// One result row, keyed by column name.
#[derive(Debug, Clone, Default)]
pub struct SqlRow {
    values: HashMap<String, SqlValue>,
}

impl SqlRow {
    pub fn new(values: HashMap<String, SqlValue>) -> Self {
        Self { values }
    }

    fn value(&self, column: &str) -> Result<&SqlValue> {
        self.values.get(column).ok_or_else(|| {
            DatabaseError::QueryFailed(format!("missing column '{column}' in result row")).into()
        })
    }

    pub fn get_i64(&self, column: &str) -> Result<i64> {
        match self.value(column)? {
            SqlValue::Integer(v) => Ok(*v),
            other => Err(type_mismatch(column, "integer", other)),
        }
    }

    pub fn get_opt_i64(&self, column: &str) -> Result<Option<i64>> {
        match self.value(column)? {
            SqlValue::Null => Ok(None),
            SqlValue::Integer(v) => Ok(Some(*v)),
            other => Err(type_mismatch(column, "integer", other)),
        }
    }

    pub fn get_text(&self, column: &str) -> Result<String> {
        match self.value(column)? {
            SqlValue::Text(v) => Ok(v.clone()),
            other => Err(type_mismatch(column, "text", other)),
        }
    }

    pub fn get_opt_text(&self, column: &str) -> Result<Option<String>> {
        match self.value(column)? {
            SqlValue::Null => Ok(None),
            SqlValue::Text(v) => Ok(Some(v.clone())),
            other => Err(type_mismatch(column, "text", other)),
        }
    }
}

fn type_mismatch(column: &str, expected: &str, actual: &SqlValue) -> crate::errors::Error {
    DatabaseError::QueryFailed(format!(
        "column '{column}' is not {expected} (got {actual:?})"
    ))
    .into()
}

/// Affected-row metadata returned by mutating statements.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunResult {
    pub rows_affected: usize,
    pub last_insert_id: i64,
}

/// Minimal capability surface over an embedded SQL store.
///
/// The cache never touches the engine directly: migrations, repositories and
/// the transaction coordinator all go through this port, so the concrete
/// engine stays swappable and tests can observe every statement.
#[async_trait]
pub trait StorageDriver: Send + Sync {
    /// Execute one or more statements without results (DDL, BEGIN/COMMIT).
    async fn execute(&self, sql: &str) -> Result<()>;

    /// Execute a single parameterized statement, returning affected-row
    /// metadata.
    async fn run(&self, sql: &str, params: &[SqlValue]) -> Result<RunResult>;

    /// Run a query returning all rows.
    async fn query_all(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<SqlRow>>;

    /// Run a query returning at most one row.
    async fn query_first(&self, sql: &str, params: &[SqlValue]) -> Result<Option<SqlRow>>;

    /// Read the persisted schema version scalar (0 when never written).
    async fn schema_version(&self) -> Result<i64>;

    /// Persist the schema version scalar. Must participate in the
    /// surrounding transaction so a rollback restores the prior value.
    async fn set_schema_version(&self, version: i64) -> Result<()>;
}
