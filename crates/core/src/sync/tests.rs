//! Engine, scheduler and session tests over scripted ports.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::connections::{
    Connection, ConnectionRepositoryTrait, ConnectionRequest, ConnectionRequestRepositoryTrait,
    ConnectionRequestStatus,
};
use crate::errors::{DatabaseError, Error, Result};
use crate::migrations::{Migration, MigrationRunner};
use crate::remote::RemoteConnectionsApi;
use crate::store::{RunResult, SqlRow, SqlValue, StorageDriver};
use crate::sync::scheduler::spawn_periodic_sync;
use crate::sync::{CacheSession, SessionState, SyncEngine};
use crate::transaction::TransactionCoordinator;

/// Driver stub recording every statement it is handed.
#[derive(Default)]
struct RecordingDriver {
    log: Mutex<Vec<String>>,
    version: AtomicI64,
}

impl RecordingDriver {
    fn statements(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl StorageDriver for RecordingDriver {
    async fn execute(&self, sql: &str) -> Result<()> {
        self.log.lock().unwrap().push(sql.to_string());
        Ok(())
    }

    async fn run(&self, sql: &str, _params: &[SqlValue]) -> Result<RunResult> {
        self.log.lock().unwrap().push(sql.to_string());
        Ok(RunResult::default())
    }

    async fn query_all(&self, sql: &str, _params: &[SqlValue]) -> Result<Vec<SqlRow>> {
        self.log.lock().unwrap().push(sql.to_string());
        Ok(Vec::new())
    }

    async fn query_first(&self, sql: &str, _params: &[SqlValue]) -> Result<Option<SqlRow>> {
        self.log.lock().unwrap().push(sql.to_string());
        Ok(None)
    }

    async fn schema_version(&self) -> Result<i64> {
        Ok(self.version.load(Ordering::SeqCst))
    }

    async fn set_schema_version(&self, version: i64) -> Result<()> {
        self.version.store(version, Ordering::SeqCst);
        self.log
            .lock()
            .unwrap()
            .push(format!("PRAGMA user_version = {version}"));
        Ok(())
    }
}

#[derive(Default)]
struct StubConnections {
    calls: Mutex<Vec<String>>,
    rows: Mutex<Vec<Connection>>,
    fail_upsert: AtomicBool,
    fail_delete_all: AtomicBool,
}

impl StubConnections {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl ConnectionRepositoryTrait for StubConnections {
    async fn get_by_user_id(&self, user_id: &str) -> Result<Vec<Connection>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.user_id1 == user_id || c.user_id2 == user_id)
            .cloned()
            .collect())
    }

    async fn get_by_id(&self, connection_id: i64) -> Result<Option<Connection>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.connection_id == connection_id)
            .cloned())
    }

    async fn upsert_many(&self, connections: &[Connection]) -> Result<()> {
        if connections.is_empty() {
            return Ok(());
        }
        self.calls
            .lock()
            .unwrap()
            .push(format!("upsert:{}", connections.len()));
        if self.fail_upsert.load(Ordering::SeqCst) {
            return Err(DatabaseError::ConstraintViolation("injected".to_string()).into());
        }
        let mut rows = self.rows.lock().unwrap();
        for connection in connections {
            rows.retain(|c| c.connection_id != connection.connection_id);
            rows.push(connection.clone());
        }
        Ok(())
    }

    async fn delete_by_id(&self, connection_id: i64) -> Result<()> {
        self.rows
            .lock()
            .unwrap()
            .retain(|c| c.connection_id != connection_id);
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        self.calls.lock().unwrap().push("delete_all".to_string());
        if self.fail_delete_all.load(Ordering::SeqCst) {
            return Err(DatabaseError::QueryFailed("injected".to_string()).into());
        }
        self.rows.lock().unwrap().clear();
        Ok(())
    }
}

#[derive(Default)]
struct StubRequests {
    calls: Mutex<Vec<String>>,
    rows: Mutex<Vec<ConnectionRequest>>,
}

impl StubRequests {
    fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl ConnectionRequestRepositoryTrait for StubRequests {
    async fn get_by_user_id(
        &self,
        user_id: &str,
        status: Option<ConnectionRequestStatus>,
    ) -> Result<Vec<ConnectionRequest>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.requester_id == user_id || r.receiver_id == user_id)
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect())
    }

    async fn upsert_many(&self, requests: &[ConnectionRequest]) -> Result<()> {
        if requests.is_empty() {
            return Ok(());
        }
        self.calls
            .lock()
            .unwrap()
            .push(format!("upsert:{}", requests.len()));
        let mut rows = self.rows.lock().unwrap();
        for request in requests {
            rows.retain(|r| r.request_id != request.request_id);
            rows.push(request.clone());
        }
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        self.calls.lock().unwrap().push("delete_all".to_string());
        self.rows.lock().unwrap().clear();
        Ok(())
    }
}

#[derive(Default)]
struct StubRemote {
    connections: Mutex<Vec<Connection>>,
    requests: Mutex<Vec<ConnectionRequest>>,
    fail: AtomicBool,
    fetches: AtomicUsize,
    in_call: AtomicBool,
    overlapped: AtomicBool,
    delay: Mutex<Duration>,
}

impl StubRemote {
    fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> Result<()> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.in_call.swap(true, Ordering::SeqCst) {
            self.overlapped.store(true, Ordering::SeqCst);
        }
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_call.store(false, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::remote_fetch("injected transport failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteConnectionsApi for StubRemote {
    async fn fetch_connections(&self, _user_id: &str) -> Result<Vec<Connection>> {
        self.enter().await?;
        Ok(self.connections.lock().unwrap().clone())
    }

    async fn fetch_connection_requests(&self, _user_id: &str) -> Result<Vec<ConnectionRequest>> {
        self.enter().await?;
        Ok(self.requests.lock().unwrap().clone())
    }
}

fn connection(id: i64, user1: &str, user2: &str, connected_at: i64) -> Connection {
    Connection {
        connection_id: id,
        user_id1: user1.to_string(),
        user_id1_username: None,
        user_id1_first_name: None,
        user_id1_last_name: None,
        user_id1_image_url: None,
        user_id2: user2.to_string(),
        user_id2_username: None,
        user_id2_first_name: None,
        user_id2_last_name: None,
        user_id2_image_url: None,
        connected_at,
    }
}

fn request(id: i64, requester: &str, receiver: &str, status: ConnectionRequestStatus) -> ConnectionRequest {
    ConnectionRequest {
        request_id: id,
        requester_id: requester.to_string(),
        requester_username: None,
        requester_first_name: None,
        requester_last_name: None,
        requester_image_url: None,
        receiver_id: receiver.to_string(),
        receiver_username: None,
        receiver_first_name: None,
        receiver_last_name: None,
        receiver_image_url: None,
        greeting_text: None,
        status,
        created_at: 100,
        responded_at: None,
    }
}

struct Harness {
    driver: Arc<RecordingDriver>,
    remote: Arc<StubRemote>,
    connections: Arc<StubConnections>,
    requests: Arc<StubRequests>,
    tx: Arc<TransactionCoordinator>,
    engine: Arc<SyncEngine>,
}

fn harness() -> Harness {
    let driver = Arc::new(RecordingDriver::default());
    let remote = Arc::new(StubRemote::default());
    let connections = Arc::new(StubConnections::default());
    let requests = Arc::new(StubRequests::default());
    let tx = Arc::new(TransactionCoordinator::new(driver.clone()));
    let engine = Arc::new(SyncEngine::new(
        remote.clone(),
        connections.clone(),
        requests.clone(),
        tx.clone(),
    ));
    Harness {
        driver,
        remote,
        connections,
        requests,
        tx,
        engine,
    }
}

fn session(h: &Harness, runner: MigrationRunner) -> CacheSession {
    CacheSession::new(
        runner,
        h.engine.clone(),
        h.connections.clone(),
        h.requests.clone(),
        h.tx.clone(),
    )
}

struct StepProbe {
    label: &'static str,
    applied: Arc<Mutex<Vec<&'static str>>>,
    fail: bool,
}

#[async_trait]
impl Migration for StepProbe {
    async fn apply(&self, _driver: &dyn StorageDriver) -> Result<()> {
        if self.fail {
            return Err(DatabaseError::QueryFailed(format!("step {} exploded", self.label)).into());
        }
        self.applied.lock().unwrap().push(self.label);
        Ok(())
    }
}

fn probe(
    label: &'static str,
    applied: &Arc<Mutex<Vec<&'static str>>>,
    fail: bool,
) -> Arc<dyn Migration> {
    Arc::new(StepProbe {
        label,
        applied: applied.clone(),
        fail,
    })
}

#[tokio::test]
async fn sync_replaces_collection_inside_one_transaction() {
    let h = harness();
    *h.remote.connections.lock().unwrap() =
        vec![connection(1, "u1", "u2", 10), connection(2, "u1", "u3", 20)];

    h.engine.sync_connections("u1").await.unwrap();

    assert_eq!(h.driver.statements(), vec!["BEGIN;", "COMMIT;"]);
    assert_eq!(h.connections.calls(), vec!["delete_all", "upsert:2"]);
    assert_eq!(h.connections.row_count(), 2);
    assert!(!h.tx.is_active());
}

#[tokio::test]
async fn remote_failure_opens_no_transaction() {
    let h = harness();
    h.remote.fail.store(true, Ordering::SeqCst);

    let err = h.engine.sync_connections("u1").await.unwrap_err();

    assert!(matches!(err, Error::RemoteFetch(_)));
    assert!(h.driver.statements().is_empty());
    assert!(h.connections.calls().is_empty());
}

#[tokio::test]
async fn store_failure_rolls_back_and_propagates() {
    let h = harness();
    *h.remote.connections.lock().unwrap() = vec![connection(1, "u1", "u2", 10)];
    h.connections.fail_upsert.store(true, Ordering::SeqCst);

    let err = h.engine.sync_connections("u1").await.unwrap_err();

    assert!(err.is_constraint_violation());
    assert_eq!(h.driver.statements(), vec!["BEGIN;", "ROLLBACK;"]);
    assert!(!h.tx.is_active());
}

#[tokio::test]
async fn repeated_sync_with_unchanged_snapshot_is_idempotent() {
    let h = harness();
    *h.remote.connections.lock().unwrap() = vec![connection(1, "u1", "u2", 10)];

    h.engine.sync_connections("u1").await.unwrap();
    let after_first = h.connections.rows.lock().unwrap().clone();
    h.engine.sync_connections("u1").await.unwrap();
    let after_second = h.connections.rows.lock().unwrap().clone();

    assert_eq!(after_first, after_second);
}

#[tokio::test]
async fn nested_begin_is_rejected() {
    let h = harness();
    h.tx.begin().await.unwrap();

    let err = h.tx.begin().await.unwrap_err();
    assert!(matches!(
        err,
        Error::Database(DatabaseError::TransactionFailed(_))
    ));

    h.tx.rollback().await.unwrap();
}

#[tokio::test]
async fn commit_without_begin_is_rejected() {
    let h = harness();
    let err = h.tx.commit().await.unwrap_err();
    assert!(matches!(
        err,
        Error::Database(DatabaseError::TransactionFailed(_))
    ));
}

#[tokio::test]
async fn migrations_apply_in_order_and_persist_each_version() {
    let h = harness();
    let applied = Arc::new(Mutex::new(Vec::new()));
    let mut runner = MigrationRunner::new(h.driver.clone(), h.tx.clone());
    runner.register(1, probe("one", &applied, false));
    runner.register(0, probe("zero", &applied, false));

    runner.initialize().await.unwrap();

    assert_eq!(*applied.lock().unwrap(), vec!["zero", "one"]);
    assert_eq!(h.driver.version.load(Ordering::SeqCst), 2);
    assert_eq!(
        h.driver.statements(),
        vec![
            "BEGIN;",
            "PRAGMA user_version = 1",
            "PRAGMA user_version = 2",
            "COMMIT;"
        ]
    );
}

#[tokio::test]
async fn migration_gap_halts_progress() {
    let h = harness();
    let applied = Arc::new(Mutex::new(Vec::new()));
    let mut runner = MigrationRunner::new(h.driver.clone(), h.tx.clone());
    runner.register(0, probe("zero", &applied, false));
    runner.register(2, probe("two", &applied, false));

    assert_eq!(runner.target_version(), 1);
    runner.initialize().await.unwrap();

    assert_eq!(*applied.lock().unwrap(), vec!["zero"]);
    assert_eq!(h.driver.version.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failing_migration_step_is_fatal_and_rolls_back() {
    let h = harness();
    let applied = Arc::new(Mutex::new(Vec::new()));
    let mut runner = MigrationRunner::new(h.driver.clone(), h.tx.clone());
    runner.register(0, probe("zero", &applied, false));
    runner.register(1, probe("one", &applied, true));

    let err = runner.initialize().await.unwrap_err();

    assert!(matches!(err, Error::MigrationFailed { from_version: 1, .. }));
    assert_eq!(h.driver.statements().last().map(String::as_str), Some("ROLLBACK;"));
    assert!(!h.tx.is_active());
}

#[tokio::test]
async fn initialize_without_pending_steps_issues_nothing() {
    let h = harness();
    h.driver.version.store(1, Ordering::SeqCst);
    let applied = Arc::new(Mutex::new(Vec::new()));
    let mut runner = MigrationRunner::new(h.driver.clone(), h.tx.clone());
    runner.register(0, probe("zero", &applied, false));

    runner.initialize().await.unwrap();

    assert!(applied.lock().unwrap().is_empty());
    assert!(h.driver.statements().is_empty());
}

#[tokio::test(start_paused = true)]
async fn periodic_cycle_failure_does_not_stop_future_ticks() {
    let h = harness();
    h.remote.fail.store(true, Ordering::SeqCst);
    let handle = spawn_periodic_sync(h.engine.clone(), "u1".to_string(), Duration::from_secs(60));

    tokio::time::sleep(Duration::from_secs(61)).await;
    let after_failed_tick = h.remote.fetch_count();
    assert!(after_failed_tick >= 1);
    assert_eq!(h.connections.row_count(), 0);

    h.remote.fail.store(false, Ordering::SeqCst);
    *h.remote.connections.lock().unwrap() = vec![connection(1, "u1", "u2", 10)];
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert!(h.remote.fetch_count() > after_failed_tick);
    assert_eq!(h.connections.row_count(), 1);
    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_future_ticks() {
    let h = harness();
    let handle = spawn_periodic_sync(h.engine.clone(), "u1".to_string(), Duration::from_secs(60));
    tokio::time::sleep(Duration::from_secs(61)).await;
    handle.stop().await;

    let fetched = h.remote.fetch_count();
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(h.remote.fetch_count(), fetched);
}

#[tokio::test(start_paused = true)]
async fn slow_cycles_never_overlap() {
    let h = harness();
    *h.remote.delay.lock().unwrap() = Duration::from_secs(5);
    let handle = spawn_periodic_sync(h.engine.clone(), "u1".to_string(), Duration::from_secs(1));

    tokio::time::sleep(Duration::from_secs(30)).await;
    handle.stop().await;

    assert!(h.remote.fetch_count() >= 2);
    assert!(!h.remote.overlapped.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn login_brings_session_ready_and_starts_periodic_sync() {
    let h = harness();
    *h.remote.connections.lock().unwrap() =
        vec![connection(1, "u1", "u2", 10), connection(2, "u1", "u3", 20)];
    *h.remote.requests.lock().unwrap() =
        vec![request(7, "u4", "u1", ConnectionRequestStatus::Pending)];
    let runner = MigrationRunner::new(h.driver.clone(), h.tx.clone());
    let session = session(&h, runner);

    session.on_login("u1", Duration::from_secs(60)).await.unwrap();

    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(session.get_connections_by_user_id("u1").await.unwrap().len(), 2);
    assert_eq!(
        session.get_connection_requests("u1", None).await.unwrap().len(),
        1
    );

    let after_login = h.remote.fetch_count();
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert!(h.remote.fetch_count() > after_login);

    session.on_logout().await.unwrap();
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(h.connections.row_count(), 0);
    assert_eq!(h.requests.row_count(), 0);

    let after_logout = h.remote.fetch_count();
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(h.remote.fetch_count(), after_logout);
}

#[tokio::test]
async fn login_migration_failure_leaves_session_uninitialized() {
    let h = harness();
    let applied = Arc::new(Mutex::new(Vec::new()));
    let mut runner = MigrationRunner::new(h.driver.clone(), h.tx.clone());
    runner.register(0, probe("zero", &applied, true));
    let session = session(&h, runner);

    let err = session.on_login("u1", Duration::from_secs(60)).await.unwrap_err();

    assert!(matches!(err, Error::MigrationFailed { .. }));
    assert_eq!(session.state(), SessionState::Uninitialized);
    assert_eq!(h.remote.fetch_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn login_initial_sync_failure_leaves_session_uninitialized() {
    let h = harness();
    h.remote.fail.store(true, Ordering::SeqCst);
    let runner = MigrationRunner::new(h.driver.clone(), h.tx.clone());
    let session = session(&h, runner);

    let err = session.on_login("u1", Duration::from_secs(60)).await.unwrap_err();

    assert!(matches!(err, Error::RemoteFetch(_)));
    assert_eq!(session.state(), SessionState::Uninitialized);

    let attempted = h.remote.fetch_count();
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(h.remote.fetch_count(), attempted);
}

#[tokio::test]
async fn accessors_before_login_report_not_initialized() {
    let h = harness();
    let runner = MigrationRunner::new(h.driver.clone(), h.tx.clone());
    let session = session(&h, runner);

    let err = session.get_connections_by_user_id("u1").await.unwrap_err();
    assert!(matches!(err, Error::NotInitialized));
}

#[tokio::test]
async fn logout_before_ready_is_a_noop() {
    let h = harness();
    let runner = MigrationRunner::new(h.driver.clone(), h.tx.clone());
    let session = session(&h, runner);

    session.on_logout().await.unwrap();
    assert!(h.driver.statements().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_logout_purge_keeps_data_and_timer_stays_canceled() {
    let h = harness();
    *h.remote.connections.lock().unwrap() = vec![connection(1, "u1", "u2", 10)];
    let runner = MigrationRunner::new(h.driver.clone(), h.tx.clone());
    let session = session(&h, runner);
    session.on_login("u1", Duration::from_secs(60)).await.unwrap();

    h.connections.fail_delete_all.store(true, Ordering::SeqCst);
    let err = session.on_logout().await.unwrap_err();
    assert!(matches!(err, Error::Database(_)));

    // Prior data intact, reads still served.
    h.connections.fail_delete_all.store(false, Ordering::SeqCst);
    assert_eq!(session.get_connections_by_user_id("u1").await.unwrap().len(), 1);

    let attempted = h.remote.fetch_count();
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(h.remote.fetch_count(), attempted);
}
