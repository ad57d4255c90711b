//! Remote data-fetch port.
//!
//! The backend is the source of truth; the cache only ever pulls full
//! snapshots through this interface and never writes back. A concrete HTTP
//! client lives with the host application.

use async_trait::async_trait;

use crate::connections::{Connection, ConnectionRequest};
use crate::errors::Result;

#[async_trait]
pub trait RemoteConnectionsApi: Send + Sync {
    /// Fetch the full current connections collection for a user.
    async fn fetch_connections(&self, user_id: &str) -> Result<Vec<Connection>>;

    /// Fetch the full current connection-requests collection for a user.
    async fn fetch_connection_requests(&self, user_id: &str) -> Result<Vec<ConnectionRequest>>;
}
