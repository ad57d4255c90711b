//! Transaction coordinator over the storage driver port.
//!
//! All multi-statement mutations in the cache (migration application,
//! collection replacement, logout purge) serialize through one coordinator
//! instance; it enforces the single active-transaction invariant and maps
//! begin/commit/rollback onto the store's native primitives.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::errors::{DatabaseError, Result};
use crate::store::StorageDriver;

pub struct TransactionCoordinator {
    driver: Arc<dyn StorageDriver>,
    active: AtomicBool,
}

impl TransactionCoordinator {
    pub fn new(driver: Arc<dyn StorageDriver>) -> Self {
        Self {
            driver,
            active: AtomicBool::new(false),
        }
    }

    /// Open a transaction. Nesting is not supported: calling `begin` while a
    /// transaction is open is a caller error.
    pub async fn begin(&self) -> Result<()> {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(DatabaseError::TransactionFailed(
                "a transaction is already open".to_string(),
            )
            .into());
        }
        if let Err(err) = self.driver.execute("BEGIN;").await {
            self.active.store(false, Ordering::SeqCst);
            return Err(err);
        }
        Ok(())
    }

    pub async fn commit(&self) -> Result<()> {
        self.require_active("commit")?;
        let result = self.driver.execute("COMMIT;").await;
        self.active.store(false, Ordering::SeqCst);
        result
    }

    pub async fn rollback(&self) -> Result<()> {
        self.require_active("rollback")?;
        let result = self.driver.execute("ROLLBACK;").await;
        self.active.store(false, Ordering::SeqCst);
        result
    }

    /// True while a transaction opened through this coordinator is pending.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn require_active(&self, op: &str) -> Result<()> {
        if self.active.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DatabaseError::TransactionFailed(format!("{op} without an open transaction"))
                .into())
        }
    }
}
