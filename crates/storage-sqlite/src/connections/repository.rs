//! SQLite repository for cached connections.

use std::sync::Arc;

use async_trait::async_trait;
use log::debug;

use connect_cache_core::connections::{Connection, ConnectionRepositoryTrait};
use connect_cache_core::store::{SqlRow, SqlValue, StorageDriver};
use connect_cache_core::Result;

const GET_BY_USER_ID_SQL: &str = "\
SELECT * FROM connections
WHERE user_id1 = ?1 OR user_id2 = ?1
ORDER BY connected_at DESC";

const GET_BY_ID_SQL: &str = "SELECT * FROM connections WHERE connection_id = ?1";

const DELETE_BY_ID_SQL: &str = "DELETE FROM connections WHERE connection_id = ?1";

const DELETE_ALL_SQL: &str = "DELETE FROM connections";

const UPSERT_COLUMNS: &str = "\
connection_id, user_id1, user_id1_username, user_id1_first_name, user_id1_last_name, \
user_id1_image_url, user_id2, user_id2_username, user_id2_first_name, user_id2_last_name, \
user_id2_image_url, connected_at";

const UPSERT_COLUMN_COUNT: usize = 12;

/// Bulk upsert keyed by the remote identifier; on conflict every non-key
/// column takes the incoming value.
fn upsert_sql(row_count: usize) -> String {
    let row = format!("({})", vec!["?"; UPSERT_COLUMN_COUNT].join(", "));
    let values = vec![row; row_count].join(", ");
    format!(
        "INSERT INTO connections ({UPSERT_COLUMNS}) VALUES {values} \
         ON CONFLICT(connection_id) DO UPDATE SET \
         user_id1 = excluded.user_id1, \
         user_id1_username = excluded.user_id1_username, \
         user_id1_first_name = excluded.user_id1_first_name, \
         user_id1_last_name = excluded.user_id1_last_name, \
         user_id1_image_url = excluded.user_id1_image_url, \
         user_id2 = excluded.user_id2, \
         user_id2_username = excluded.user_id2_username, \
         user_id2_first_name = excluded.user_id2_first_name, \
         user_id2_last_name = excluded.user_id2_last_name, \
         user_id2_image_url = excluded.user_id2_image_url, \
         connected_at = excluded.connected_at"
    )
}

fn push_params(params: &mut Vec<SqlValue>, connection: &Connection) {
    params.push(SqlValue::Integer(connection.connection_id));
    params.push(SqlValue::from(connection.user_id1.as_str()));
    params.push(SqlValue::from(&connection.user_id1_username));
    params.push(SqlValue::from(&connection.user_id1_first_name));
    params.push(SqlValue::from(&connection.user_id1_last_name));
    params.push(SqlValue::from(&connection.user_id1_image_url));
    params.push(SqlValue::from(connection.user_id2.as_str()));
    params.push(SqlValue::from(&connection.user_id2_username));
    params.push(SqlValue::from(&connection.user_id2_first_name));
    params.push(SqlValue::from(&connection.user_id2_last_name));
    params.push(SqlValue::from(&connection.user_id2_image_url));
    params.push(SqlValue::Integer(connection.connected_at));
}

fn connection_from_row(row: &SqlRow) -> Result<Connection> {
    Ok(Connection {
        connection_id: row.get_i64("connection_id")?,
        user_id1: row.get_text("user_id1")?,
        user_id1_username: row.get_opt_text("user_id1_username")?,
        user_id1_first_name: row.get_opt_text("user_id1_first_name")?,
        user_id1_last_name: row.get_opt_text("user_id1_last_name")?,
        user_id1_image_url: row.get_opt_text("user_id1_image_url")?,
        user_id2: row.get_text("user_id2")?,
        user_id2_username: row.get_opt_text("user_id2_username")?,
        user_id2_first_name: row.get_opt_text("user_id2_first_name")?,
        user_id2_last_name: row.get_opt_text("user_id2_last_name")?,
        user_id2_image_url: row.get_opt_text("user_id2_image_url")?,
        connected_at: row.get_i64("connected_at")?,
    })
}

pub struct ConnectionRepository {
    driver: Arc<dyn StorageDriver>,
}

impl ConnectionRepository {
    pub fn new(driver: Arc<dyn StorageDriver>) -> Self {
        Self { driver }
    }
}

#[async_trait]
impl ConnectionRepositoryTrait for ConnectionRepository {
    async fn get_by_user_id(&self, user_id: &str) -> Result<Vec<Connection>> {
        let rows = self
            .driver
            .query_all(GET_BY_USER_ID_SQL, &[SqlValue::from(user_id)])
            .await?;
        rows.iter().map(connection_from_row).collect()
    }

    async fn get_by_id(&self, connection_id: i64) -> Result<Option<Connection>> {
        let row = self
            .driver
            .query_first(GET_BY_ID_SQL, &[SqlValue::Integer(connection_id)])
            .await?;
        row.as_ref().map(connection_from_row).transpose()
    }

    async fn upsert_many(&self, connections: &[Connection]) -> Result<()> {
        if connections.is_empty() {
            return Ok(());
        }
        let mut params = Vec::with_capacity(connections.len() * UPSERT_COLUMN_COUNT);
        for connection in connections {
            push_params(&mut params, connection);
        }
        debug!("upserting {} connections", connections.len());
        self.driver
            .run(&upsert_sql(connections.len()), &params)
            .await?;
        Ok(())
    }

    async fn delete_by_id(&self, connection_id: i64) -> Result<()> {
        self.driver
            .run(DELETE_BY_ID_SQL, &[SqlValue::Integer(connection_id)])
            .await?;
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        self.driver.run(DELETE_ALL_SQL, &[]).await?;
        Ok(())
    }
}
