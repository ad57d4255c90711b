//! Sync engine, periodic scheduler and session lifecycle.

mod engine;
mod scheduler;
mod session;

pub use engine::SyncEngine;
pub use scheduler::{spawn_periodic_sync, PeriodicSyncHandle};
pub use session::{CacheSession, SessionState};

#[cfg(test)]
mod tests;
