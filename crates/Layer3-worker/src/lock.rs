//! Per-repository advisory locks
//!
//! One async mutex per `(requester_id, short_name)`. Entries are created on
//! demand and dropped again when the last holder or waiter lets go.

use hermes_foundation::{Error, RepoKey, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

type LockTable = Arc<Mutex<HashMap<RepoKey, Arc<AsyncMutex<()>>>>>;

#[derive(Debug, Clone)]
pub struct KeyedLocks {
    table: LockTable,
    timeout: Duration,
}

impl KeyedLocks {
    pub fn new(timeout: Duration) -> Self {
        Self {
            table: Arc::new(Mutex::new(HashMap::new())),
            timeout,
        }
    }

    /// Acquire `key`, waiting at most the configured timeout.
    ///
    /// Fails with [`Error::LockTimeout`] while another task holds the key.
    pub async fn acquire(&self, key: &RepoKey) -> Result<KeyGuard> {
        let mutex = {
            let mut table = self.table.lock();
            Arc::clone(table.entry(key.clone()).or_default())
        };

        let acquired = tokio::time::timeout(self.timeout, Arc::clone(&mutex).lock_owned()).await;
        drop(mutex);

        match acquired {
            Ok(guard) => {
                debug!(key = %key, "Repository lock acquired");
                Ok(KeyGuard {
                    guard: Some(guard),
                    key: key.clone(),
                    table: Arc::clone(&self.table),
                })
            }
            Err(_) => {
                self.prune(key);
                Err(Error::lock_timeout(key.to_string()))
            }
        }
    }

    /// Keys currently tracked (held or awaited)
    pub fn tracked(&self) -> usize {
        self.table.lock().len()
    }

    fn prune(&self, key: &RepoKey) {
        prune(&self.table, key);
    }
}

/// Drop the table entry when only the table itself still refers to it
fn prune(table: &LockTable, key: &RepoKey) {
    let mut table = table.lock();
    if let Some(mutex) = table.get(key) {
        if Arc::strong_count(mutex) == 1 {
            table.remove(key);
        }
    }
}

/// Held lock; released on drop, including on error and panic unwinding
#[derive(Debug)]
pub struct KeyGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: RepoKey,
    table: LockTable,
}

impl KeyGuard {
    pub fn key(&self) -> &RepoKey {
        &self.key
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        // Release first so the strong count reflects only waiters.
        self.guard.take();
        prune(&self.table, &self.key);
        debug!(key = %self.key, "Repository lock released");
    }
}
