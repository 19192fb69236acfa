//! Per-key serialization of read-check-write sequences.
//!
//! Every mutation runs as: acquire the key → load → decide → conditional
//! write → release the key. The controller decides what "acquire" means:
//!
//! - [`KeyedLockController`] holds an in-process exclusive lock per
//!   `(store, product)` key with a bounded wait. Writers on one key queue up;
//!   writers on different keys never touch the same lock.
//! - [`OptimisticController`] takes no lock and relies entirely on the
//!   store's conditional writes. Losers of a race get `StoreError::Conflict`
//!   and the engine retries with a fresh read.
//!
//! In both cases the store's version check stays in force, so several engine
//! processes sharing one database remain linearizable per key.

pub mod keyed_lock;
pub mod optimistic;

use core::str::FromStr;

use async_trait::async_trait;
use tokio::sync::OwnedMutexGuard;

use stockledger_inventory::{InventoryKey, InventoryResult};

pub use keyed_lock::KeyedLockController;
pub use optimistic::OptimisticController;

/// Serialization primitive scoped to one inventory key.
#[async_trait]
pub trait KeyedConcurrencyController: Send + Sync {
    /// Wait (bounded) for exclusive access to `key`.
    ///
    /// Dropping the returned future before it resolves gives up the place in
    /// line without ever holding the key.
    async fn acquire(&self, key: InventoryKey) -> InventoryResult<KeyGuard>;
}

/// Proof of access to one key; released on drop.
#[derive(Debug)]
pub struct KeyGuard {
    lock: Option<OwnedMutexGuard<()>>,
}

impl KeyGuard {
    pub(crate) fn locked(guard: OwnedMutexGuard<()>) -> Self {
        Self { lock: Some(guard) }
    }

    pub(crate) fn unlocked() -> Self {
        Self { lock: None }
    }

    /// Whether this guard holds an in-process lock.
    pub fn is_exclusive(&self) -> bool {
        self.lock.is_some()
    }
}

/// Which controller the engine builds from configuration.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum ConcurrencyStrategy {
    #[default]
    KeyedLock,
    Optimistic,
}

impl FromStr for ConcurrencyStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyed-lock" | "keyed_lock" | "lock" => Ok(Self::KeyedLock),
            "optimistic" | "cas" => Ok(Self::Optimistic),
            other => Err(format!(
                "unknown concurrency strategy '{other}' (expected keyed-lock|optimistic)"
            )),
        }
    }
}
