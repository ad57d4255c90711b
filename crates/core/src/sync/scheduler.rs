//! Periodic resync task.
//!
//! The timer re-arms only after the previous cycle's async work resolves,
//! so two cycles can never race on the transaction coordinator. Cancellation
//! is deterministic: `stop` signals the task and awaits it, so no tick fires
//! after it returns; a cycle already in flight completes (or rolls back)
//! first.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::engine::SyncEngine;

/// Handle to a running periodic sync task.
pub struct PeriodicSyncHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
    in_flight: Arc<AtomicBool>,
}

impl PeriodicSyncHandle {
    /// True while a sync cycle is currently running.
    pub fn is_cycle_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Cancel the timer and wait for the task to finish.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(err) = self.task.await {
            warn!("periodic sync task did not shut down cleanly: {err}");
        }
        info!("stopped periodic sync");
    }
}

/// Spawn the recurring resync task for `user_id`.
pub fn spawn_periodic_sync(
    engine: Arc<SyncEngine>,
    user_id: String,
    interval: Duration,
) -> PeriodicSyncHandle {
    let (stop_tx, mut stop_rx) = watch::channel(false);
    let in_flight = Arc::new(AtomicBool::new(false));
    let cycle_flag = in_flight.clone();

    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = stop_rx.changed() => break,
                _ = tokio::time::sleep(interval) => {}
            }
            if *stop_rx.borrow() {
                break;
            }

            cycle_flag.store(true, Ordering::SeqCst);
            run_cycle(&engine, &user_id).await;
            cycle_flag.store(false, Ordering::SeqCst);
        }
        debug!("periodic sync loop for user {user_id} exited");
    });

    PeriodicSyncHandle {
        stop_tx,
        task,
        in_flight,
    }
}

/// One periodic cycle. Failures are logged, never rethrown: a failed cycle
/// keeps the last good snapshot and does not stop future ticks.
async fn run_cycle(engine: &SyncEngine, user_id: &str) {
    if let Err(err) = engine.sync_connections(user_id).await {
        warn!("periodic connections sync failed: {err}");
        return;
    }
    if let Err(err) = engine.sync_connection_requests(user_id).await {
        warn!("periodic connection requests sync failed: {err}");
    }
}
