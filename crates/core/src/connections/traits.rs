//! Repository ports for the cached collections.

use async_trait::async_trait;

use crate::errors::Result;

use super::model::{Connection, ConnectionRequest, ConnectionRequestStatus};

/// Local cache of the connections collection.
#[async_trait]
pub trait ConnectionRepositoryTrait: Send + Sync {
    /// Connections involving `user_id`, most recently connected first.
    async fn get_by_user_id(&self, user_id: &str) -> Result<Vec<Connection>>;

    async fn get_by_id(&self, connection_id: i64) -> Result<Option<Connection>>;

    /// Bulk insert-or-update keyed by `connection_id`; on conflict every
    /// non-key field takes the incoming value. An empty slice is a no-op
    /// and must not issue a statement.
    async fn upsert_many(&self, connections: &[Connection]) -> Result<()>;

    async fn delete_by_id(&self, connection_id: i64) -> Result<()>;

    /// Unconditionally clear the cached collection.
    async fn delete_all(&self) -> Result<()>;
}

/// Local cache of the connection-requests collection.
#[async_trait]
pub trait ConnectionRequestRepositoryTrait: Send + Sync {
    /// Requests where `user_id` is requester or receiver, ordered by
    /// resolution time (falling back to creation time) descending. A status
    /// filter, when provided, restricts results to exactly that status via
    /// the same single parameterized query.
    async fn get_by_user_id(
        &self,
        user_id: &str,
        status: Option<ConnectionRequestStatus>,
    ) -> Result<Vec<ConnectionRequest>>;

    /// Bulk insert-or-update keyed by `request_id`, last-writer-wins.
    /// An empty slice is a no-op and must not issue a statement.
    async fn upsert_many(&self, requests: &[ConnectionRequest]) -> Result<()>;

    /// Unconditionally clear the cached collection.
    async fn delete_all(&self) -> Result<()>;
}
