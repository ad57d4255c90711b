//! Versioned schema migration runner.
//!
//! Steps are keyed by the schema version they upgrade *from* and applied
//! strictly in ascending order, one increment at a time, inside a single
//! transaction. The persisted version advances after each step so partial
//! progress is visible for diagnostics, but the surrounding transaction
//! commits only once every pending step has succeeded.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, error, info, warn};

use crate::errors::{Error, Result};
use crate::store::StorageDriver;
use crate::transaction::TransactionCoordinator;

/// One schema transformation, idempotent within its transaction.
#[async_trait]
pub trait Migration: Send + Sync {
    async fn apply(&self, driver: &dyn StorageDriver) -> Result<()>;
}

/// A migration step defined as a list of SQL batches.
pub struct SqlMigration {
    statements: Vec<String>,
}

impl SqlMigration {
    pub fn new<I, S>(statements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            statements: statements.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl Migration for SqlMigration {
    async fn apply(&self, driver: &dyn StorageDriver) -> Result<()> {
        for statement in &self.statements {
            driver.execute(statement).await?;
        }
        Ok(())
    }
}

/// Owns the registered step set and brings the store up to date at startup.
pub struct MigrationRunner {
    driver: Arc<dyn StorageDriver>,
    tx: Arc<TransactionCoordinator>,
    steps: BTreeMap<i64, Arc<dyn Migration>>,
}

impl MigrationRunner {
    pub fn new(driver: Arc<dyn StorageDriver>, tx: Arc<TransactionCoordinator>) -> Self {
        Self {
            driver,
            tx,
            steps: BTreeMap::new(),
        }
    }

    /// Register the step upgrading `from_version` to `from_version + 1`.
    ///
    /// Must happen before [`initialize`](Self::initialize). Re-registering a
    /// version replaces the previous step; last registration wins.
    pub fn register(&mut self, from_version: i64, step: Arc<dyn Migration>) {
        if self.steps.insert(from_version, step).is_some() {
            warn!("migration for version {from_version} re-registered; last registration wins");
        }
    }

    /// Highest version reachable from 0 through contiguously registered
    /// steps. A gap in the registered set halts progress at the gap.
    pub fn target_version(&self) -> i64 {
        let mut version = 0;
        while self.steps.contains_key(&version) {
            version += 1;
        }
        version
    }

    /// Apply all pending steps as one atomic unit.
    ///
    /// On any step failure the whole transaction rolls back, the persisted
    /// version keeps its pre-transaction value, and the failure is fatal for
    /// the session: there is no retry policy.
    pub async fn initialize(&self) -> Result<()> {
        let mut version = self.driver.schema_version().await?;
        if !self.steps.contains_key(&version) {
            debug!("schema already at version {version}, no pending migrations");
            return Ok(());
        }

        self.tx.begin().await?;
        match self.apply_pending(&mut version).await {
            Ok(()) => {
                self.tx.commit().await?;
                info!("schema migrated to version {version}");
                Ok(())
            }
            Err(err) => {
                error!("migration from version {version} failed: {err}");
                if let Err(rb) = self.tx.rollback().await {
                    warn!("rollback after failed migration also failed: {rb}");
                }
                Err(Error::MigrationFailed {
                    from_version: version,
                    message: err.to_string(),
                })
            }
        }
    }

    async fn apply_pending(&self, version: &mut i64) -> Result<()> {
        while let Some(step) = self.steps.get(version).cloned() {
            debug!("applying migration {} -> {}", *version, *version + 1);
            step.apply(self.driver.as_ref()).await?;
            *version += 1;
            self.driver.set_schema_version(*version).await?;
        }
        Ok(())
    }
}
