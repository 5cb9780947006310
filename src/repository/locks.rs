//! Per-repository mutual exclusion
//!
//! Each indexing step builds on the previous step's committed state, so
//! two runs against the same repository must never interleave. Runs on
//! different repositories proceed in parallel.

use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Default)]
pub struct RepoLocks {
    locks: Mutex<FxHashMap<String, Arc<AsyncMutex<()>>>>,
}

impl RepoLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `repo`; released when the guard drops
    pub async fn lock(&self, repo: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(repo.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Drop the entry for `repo` unless a run holds or awaits it
    pub fn forget(&self, repo: &str) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks.get(repo).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(repo);
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
