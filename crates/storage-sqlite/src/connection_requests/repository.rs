//! SQLite repository for cached connection requests.

use std::sync::Arc;

use async_trait::async_trait;
use log::debug;

use connect_cache_core::connections::{
    ConnectionRequest, ConnectionRequestRepositoryTrait, ConnectionRequestStatus,
};
use connect_cache_core::store::{SqlRow, SqlValue, StorageDriver};
use connect_cache_core::{DatabaseError, Result};

/// Resolved requests sort by the time they were answered, open ones by the
/// time they were sent; newest first either way.
const GET_BY_USER_ID_SQL: &str = "\
SELECT * FROM connection_requests
WHERE (requester_id = ?1 OR receiver_id = ?1)
  AND (?2 IS NULL OR status = ?2)
ORDER BY COALESCE(responded_at, created_at) DESC, created_at DESC";

const DELETE_ALL_SQL: &str = "DELETE FROM connection_requests";

const UPSERT_COLUMNS: &str = "\
request_id, requester_id, requester_username, requester_first_name, requester_last_name, \
requester_image_url, receiver_id, receiver_username, receiver_first_name, receiver_last_name, \
receiver_image_url, greeting_text, status, created_at, responded_at";

const UPSERT_COLUMN_COUNT: usize = 15;

fn upsert_sql(row_count: usize) -> String {
    let row = format!("({})", vec!["?"; UPSERT_COLUMN_COUNT].join(", "));
    let values = vec![row; row_count].join(", ");
    format!(
        "INSERT INTO connection_requests ({UPSERT_COLUMNS}) VALUES {values} \
         ON CONFLICT(request_id) DO UPDATE SET \
         requester_id = excluded.requester_id, \
         requester_username = excluded.requester_username, \
         requester_first_name = excluded.requester_first_name, \
         requester_last_name = excluded.requester_last_name, \
         requester_image_url = excluded.requester_image_url, \
         receiver_id = excluded.receiver_id, \
         receiver_username = excluded.receiver_username, \
         receiver_first_name = excluded.receiver_first_name, \
         receiver_last_name = excluded.receiver_last_name, \
         receiver_image_url = excluded.receiver_image_url, \
         greeting_text = excluded.greeting_text, \
         status = excluded.status, \
         created_at = excluded.created_at, \
         responded_at = excluded.responded_at"
    )
}

fn push_params(params: &mut Vec<SqlValue>, request: &ConnectionRequest) {
    params.push(SqlValue::Integer(request.request_id));
    params.push(SqlValue::from(request.requester_id.as_str()));
    params.push(SqlValue::from(&request.requester_username));
    params.push(SqlValue::from(&request.requester_first_name));
    params.push(SqlValue::from(&request.requester_last_name));
    params.push(SqlValue::from(&request.requester_image_url));
    params.push(SqlValue::from(request.receiver_id.as_str()));
    params.push(SqlValue::from(&request.receiver_username));
    params.push(SqlValue::from(&request.receiver_first_name));
    params.push(SqlValue::from(&request.receiver_last_name));
    params.push(SqlValue::from(&request.receiver_image_url));
    params.push(SqlValue::from(&request.greeting_text));
    params.push(SqlValue::from(request.status.as_str()));
    params.push(SqlValue::Integer(request.created_at));
    params.push(SqlValue::from(request.responded_at));
}

fn request_from_row(row: &SqlRow) -> Result<ConnectionRequest> {
    let status_text = row.get_text("status")?;
    let status = ConnectionRequestStatus::parse(&status_text).ok_or_else(|| {
        DatabaseError::QueryFailed(format!("unknown request status '{status_text}'"))
    })?;
    Ok(ConnectionRequest {
        request_id: row.get_i64("request_id")?,
        requester_id: row.get_text("requester_id")?,
        requester_username: row.get_opt_text("requester_username")?,
        requester_first_name: row.get_opt_text("requester_first_name")?,
        requester_last_name: row.get_opt_text("requester_last_name")?,
        requester_image_url: row.get_opt_text("requester_image_url")?,
        receiver_id: row.get_text("receiver_id")?,
        receiver_username: row.get_opt_text("receiver_username")?,
        receiver_first_name: row.get_opt_text("receiver_first_name")?,
        receiver_last_name: row.get_opt_text("receiver_last_name")?,
        receiver_image_url: row.get_opt_text("receiver_image_url")?,
        greeting_text: row.get_opt_text("greeting_text")?,
        status,
        created_at: row.get_i64("created_at")?,
        responded_at: row.get_opt_i64("responded_at")?,
    })
}

pub struct ConnectionRequestRepository {
    driver: Arc<dyn StorageDriver>,
}

impl ConnectionRequestRepository {
    pub fn new(driver: Arc<dyn StorageDriver>) -> Self {
        Self { driver }
    }
}

#[async_trait]
impl ConnectionRequestRepositoryTrait for ConnectionRequestRepository {
    async fn get_by_user_id(
        &self,
        user_id: &str,
        status: Option<ConnectionRequestStatus>,
    ) -> Result<Vec<ConnectionRequest>> {
        let status_param = match status {
            Some(s) => SqlValue::from(s.as_str()),
            None => SqlValue::Null,
        };
        let rows = self
            .driver
            .query_all(GET_BY_USER_ID_SQL, &[SqlValue::from(user_id), status_param])
            .await?;
        rows.iter().map(request_from_row).collect()
    }

    async fn upsert_many(&self, requests: &[ConnectionRequest]) -> Result<()> {
        if requests.is_empty() {
            return Ok(());
        }
        let mut params = Vec::with_capacity(requests.len() * UPSERT_COLUMN_COUNT);
        for request in requests {
            push_params(&mut params, request);
        }
        debug!("upserting {} connection requests", requests.len());
        self.driver.run(&upsert_sql(requests.len()), &params).await?;
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        self.driver.run(DELETE_ALL_SQL, &[]).await?;
        Ok(())
    }
}
