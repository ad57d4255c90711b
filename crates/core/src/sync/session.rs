//! Session lifecycle controller.
//!
//! One `CacheSession` exists per logged-in user context; it owns the
//! migration runner, the sync engine, the periodic task handle and the
//! lifecycle state. The host application holds it as an explicit value;
//! nothing here is global.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::connections::{
    Connection, ConnectionRepositoryTrait, ConnectionRequest, ConnectionRequestRepositoryTrait,
    ConnectionRequestStatus,
};
use crate::errors::{Error, Result};
use crate::migrations::MigrationRunner;
use crate::sync::engine::SyncEngine;
use crate::sync::scheduler::{spawn_periodic_sync, PeriodicSyncHandle};
use crate::transaction::TransactionCoordinator;

/// Lifecycle state of the cache session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Ready,
    Syncing,
    Closed,
}

pub struct CacheSession {
    runner: MigrationRunner,
    engine: Arc<SyncEngine>,
    connections: Arc<dyn ConnectionRepositoryTrait>,
    requests: Arc<dyn ConnectionRequestRepositoryTrait>,
    tx: Arc<TransactionCoordinator>,
    state: Mutex<SessionState>,
    periodic: Mutex<Option<PeriodicSyncHandle>>,
}

impl CacheSession {
    pub fn new(
        runner: MigrationRunner,
        engine: Arc<SyncEngine>,
        connections: Arc<dyn ConnectionRepositoryTrait>,
        requests: Arc<dyn ConnectionRequestRepositoryTrait>,
        tx: Arc<TransactionCoordinator>,
    ) -> Self {
        Self {
            runner,
            engine,
            connections,
            requests,
            tx,
            state: Mutex::new(SessionState::Uninitialized),
            periodic: Mutex::new(None),
        }
    }

    /// Current lifecycle state; `Syncing` while a periodic cycle is in
    /// flight on an otherwise ready session.
    pub fn state(&self) -> SessionState {
        let state = *self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state == SessionState::Ready {
            let periodic = self.periodic.lock().unwrap_or_else(PoisonError::into_inner);
            if periodic
                .as_ref()
                .is_some_and(PeriodicSyncHandle::is_cycle_in_flight)
            {
                return SessionState::Syncing;
            }
        }
        state
    }

    /// Bring the store schema up to date without logging a user in.
    pub async fn initialize(&self) -> Result<()> {
        self.runner.initialize().await
    }

    /// Initialize the store, run the first full sync of both collections,
    /// then start the periodic resync timer.
    ///
    /// Migration or initial-sync failure leaves the session uninitialized
    /// and is surfaced to the caller; no retry is attempted.
    pub async fn on_login(&self, user_id: &str, sync_interval: Duration) -> Result<()> {
        self.stop_periodic().await;
        self.set_state(SessionState::Initializing);

        if let Err(err) = self.login_body(user_id).await {
            self.set_state(SessionState::Uninitialized);
            return Err(err);
        }

        let handle = spawn_periodic_sync(self.engine.clone(), user_id.to_string(), sync_interval);
        *self.periodic.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        self.set_state(SessionState::Ready);
        info!("cache session ready for user {user_id}");
        Ok(())
    }

    async fn login_body(&self, user_id: &str) -> Result<()> {
        self.runner.initialize().await?;
        self.engine.sync_connections(user_id).await?;
        self.engine.sync_connection_requests(user_id).await
    }

    /// Cancel the periodic timer, then purge both cached collections in one
    /// transaction.
    ///
    /// A no-op when the session never became ready. On purge failure the
    /// prior data stays intact and the error is surfaced, but the timer
    /// remains canceled: logging back in is the only way to resume syncing.
    pub async fn on_logout(&self) -> Result<()> {
        self.stop_periodic().await;

        let state = *self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state != SessionState::Ready {
            return Ok(());
        }

        self.tx.begin().await?;
        let purged = async {
            self.connections.delete_all().await?;
            self.requests.delete_all().await
        }
        .await;
        match purged {
            Ok(()) => {
                self.tx.commit().await?;
                self.set_state(SessionState::Closed);
                info!("cache session closed, cached collections purged");
                Ok(())
            }
            Err(err) => {
                if let Err(rb) = self.tx.rollback().await {
                    warn!("rollback after failed logout purge also failed: {rb}");
                }
                Err(err)
            }
        }
    }

    pub async fn get_connections_by_user_id(&self, user_id: &str) -> Result<Vec<Connection>> {
        self.ensure_ready()?;
        self.connections.get_by_user_id(user_id).await
    }

    pub async fn get_connection_by_id(&self, connection_id: i64) -> Result<Option<Connection>> {
        self.ensure_ready()?;
        self.connections.get_by_id(connection_id).await
    }

    pub async fn upsert_connections(&self, connections: &[Connection]) -> Result<()> {
        self.ensure_ready()?;
        self.connections.upsert_many(connections).await
    }

    pub async fn delete_connection_by_id(&self, connection_id: i64) -> Result<()> {
        self.ensure_ready()?;
        self.connections.delete_by_id(connection_id).await
    }

    pub async fn delete_all_connections(&self) -> Result<()> {
        self.ensure_ready()?;
        self.connections.delete_all().await
    }

    pub async fn get_connection_requests(
        &self,
        user_id: &str,
        status: Option<ConnectionRequestStatus>,
    ) -> Result<Vec<ConnectionRequest>> {
        self.ensure_ready()?;
        self.requests.get_by_user_id(user_id, status).await
    }

    pub async fn upsert_connection_request(&self, request: &ConnectionRequest) -> Result<()> {
        self.ensure_ready()?;
        self.requests.upsert_many(std::slice::from_ref(request)).await
    }

    pub async fn upsert_connection_requests(&self, requests: &[ConnectionRequest]) -> Result<()> {
        self.ensure_ready()?;
        self.requests.upsert_many(requests).await
    }

    pub async fn delete_all_connection_requests(&self) -> Result<()> {
        self.ensure_ready()?;
        self.requests.delete_all().await
    }

    fn ensure_ready(&self) -> Result<()> {
        match self.state() {
            SessionState::Ready | SessionState::Syncing => Ok(()),
            _ => Err(Error::NotInitialized),
        }
    }

    fn set_state(&self, state: SessionState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Idempotent: a no-op when no timer is active.
    async fn stop_periodic(&self) {
        let handle = self
            .periodic
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.stop().await;
        }
    }
}
