//! Full-resync engine: replace a cached collection with a fresh remote
//! snapshot inside one transaction.

use std::sync::Arc;

use log::{debug, warn};

use crate::connections::{ConnectionRepositoryTrait, ConnectionRequestRepositoryTrait};
use crate::errors::Result;
use crate::remote::RemoteConnectionsApi;
use crate::transaction::TransactionCoordinator;

/// Orchestrates full-collection refresh per entity type.
///
/// Full replace (delete-then-reinsert) is the consistency strategy: the
/// backend exposes no change feed to diff against, so every cycle pulls a
/// complete snapshot and rederives local identity from the remote one. The
/// two entity types sync in independent transactions; there is no
/// cross-entity atomicity, and repeating a sync against an unchanged
/// snapshot is semantically a no-op.
pub struct SyncEngine {
    remote: Arc<dyn RemoteConnectionsApi>,
    connections: Arc<dyn ConnectionRepositoryTrait>,
    requests: Arc<dyn ConnectionRequestRepositoryTrait>,
    tx: Arc<TransactionCoordinator>,
}

impl SyncEngine {
    pub fn new(
        remote: Arc<dyn RemoteConnectionsApi>,
        connections: Arc<dyn ConnectionRepositoryTrait>,
        requests: Arc<dyn ConnectionRequestRepositoryTrait>,
        tx: Arc<TransactionCoordinator>,
    ) -> Self {
        Self {
            remote,
            connections,
            requests,
            tx,
        }
    }

    /// Replace the cached connections with the backend's current set.
    ///
    /// The remote fetch happens before any transaction is opened: a
    /// transport failure leaves the local cache untouched. A failure in the
    /// local replace rolls back, keeping the prior snapshot intact.
    pub async fn sync_connections(&self, user_id: &str) -> Result<()> {
        let fetched = self.remote.fetch_connections(user_id).await?;
        debug!("syncing {} connections for user {user_id}", fetched.len());

        self.tx.begin().await?;
        let replaced = async {
            self.connections.delete_all().await?;
            self.connections.upsert_many(&fetched).await
        }
        .await;
        self.finish(replaced).await
    }

    /// Replace the cached connection requests with the backend's current set.
    pub async fn sync_connection_requests(&self, user_id: &str) -> Result<()> {
        let fetched = self.remote.fetch_connection_requests(user_id).await?;
        debug!(
            "syncing {} connection requests for user {user_id}",
            fetched.len()
        );

        self.tx.begin().await?;
        let replaced = async {
            self.requests.delete_all().await?;
            self.requests.upsert_many(&fetched).await
        }
        .await;
        self.finish(replaced).await
    }

    /// Commit on success; roll back and re-raise the original error
    /// unmodified on failure.
    async fn finish(&self, replaced: Result<()>) -> Result<()> {
        match replaced {
            Ok(()) => self.tx.commit().await,
            Err(err) => {
                if let Err(rb) = self.tx.rollback().await {
                    warn!("rollback after failed sync also failed: {rb}");
                }
                Err(err)
            }
        }
    }
}
