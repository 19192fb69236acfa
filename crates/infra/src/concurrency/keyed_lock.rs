use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use stockledger_inventory::{InventoryError, InventoryKey, InventoryResult};

use super::{KeyGuard, KeyedConcurrencyController};

type KeyLock = Arc<tokio::sync::Mutex<()>>;

/// In-process lock table keyed by `(store, product)`.
///
/// - Acquisition waits at most `timeout`, then fails with `OperationTimedOut`.
/// - Waiters are served in FIFO order (tokio mutex fairness).
/// - Entries nobody holds or waits on are pruned once the table grows past
///   `prune_threshold`.
#[derive(Debug)]
pub struct KeyedLockController {
    locks: Mutex<HashMap<InventoryKey, KeyLock>>,
    timeout: Duration,
    prune_threshold: usize,
}

impl KeyedLockController {
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            timeout,
            prune_threshold: 1024,
        }
    }

    pub fn with_prune_threshold(mut self, threshold: usize) -> Self {
        self.prune_threshold = threshold.max(1);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Number of keys currently present in the lock table.
    pub fn tracked_keys(&self) -> usize {
        self.locks.lock().map(|t| t.len()).unwrap_or(0)
    }

    fn lock_for(&self, key: InventoryKey) -> InventoryResult<KeyLock> {
        let mut table = self
            .locks
            .lock()
            .map_err(|_| InventoryError::storage("key lock table poisoned"))?;

        if table.len() >= self.prune_threshold {
            // The table's own reference is the only one left on idle entries.
            table.retain(|_, lock| Arc::strong_count(lock) > 1);
        }

        Ok(table.entry(key).or_default().clone())
    }
}

#[async_trait]
impl KeyedConcurrencyController for KeyedLockController {
    async fn acquire(&self, key: InventoryKey) -> InventoryResult<KeyGuard> {
        let lock = self.lock_for(key)?;

        match tokio::time::timeout(self.timeout, lock.lock_owned()).await {
            Ok(guard) => Ok(KeyGuard::locked(guard)),
            Err(_) => {
                warn!(key = %key, timeout_ms = self.timeout.as_millis() as u64, "key lock wait timed out");
                Err(InventoryError::timed_out(format!(
                    "waited {}ms for key {key}",
                    self.timeout.as_millis()
                )))
            }
        }
    }
}
