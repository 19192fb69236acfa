use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use stockledger_core::{ExpectedVersion, StoreId};
use stockledger_inventory::{InventoryError, InventoryKey, InventoryRecord};

/// Inventory store operation error.
///
/// These are **infrastructure errors** as opposed to ledger errors
/// (insufficient stock, invalid adjustments). The engine maps them into
/// `InventoryError`; only `Conflict` is retried.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A conditional write found the record in a different state than
    /// expected (stale version, or a concurrent lazy creation).
    #[error("conditional write conflict: {0}")]
    Conflict(String),

    /// The backend refused the write because it would break a stored
    /// constraint.
    #[error("write rejected by storage constraints: {0}")]
    Rejected(String),

    /// A persisted record could not be decoded or failed its invariants.
    #[error("corrupt inventory record: {0}")]
    Corrupt(String),

    /// Connectivity, pool or driver failure.
    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl From<StoreError> for InventoryError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(msg) => InventoryError::timed_out(msg),
            StoreError::Rejected(msg) | StoreError::Corrupt(msg) => InventoryError::invariant(msg),
            StoreError::Backend(msg) => InventoryError::storage(msg),
        }
    }
}

/// Durable keyed storage for inventory records.
///
/// The store is the only place records live, and it offers exactly what the
/// engine needs to make read-check-write sequences atomic:
///
/// - `load_for_update` reads the current record (or `None`) as the basis of a
///   decision.
/// - `conditional_save` commits a decision only if the record is still at the
///   version that decision was based on; otherwise `StoreError::Conflict`.
/// - `save` inserts a brand-new record; `StoreError::Conflict` if one already
///   exists for the key.
///
/// Committed records come back with their storage-assigned surrogate id and
/// a version one past the expected one.
///
/// The list queries are pass-through reads for reporting. They carry no
/// concurrency obligations and may observe slightly stale data.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn load_for_update(&self, key: InventoryKey) -> Result<Option<InventoryRecord>, StoreError>;

    async fn conditional_save(
        &self,
        record: InventoryRecord,
        expected: ExpectedVersion,
    ) -> Result<InventoryRecord, StoreError>;

    async fn save(&self, record: InventoryRecord) -> Result<InventoryRecord, StoreError>;

    /// Point read for display purposes.
    async fn get(&self, key: InventoryKey) -> Result<Option<InventoryRecord>, StoreError>;

    /// All records of a store, ordered by product id.
    async fn list_by_store(&self, store_id: StoreId) -> Result<Vec<InventoryRecord>, StoreError>;

    /// Records of a store at or below their reorder point, lowest availability
    /// first.
    async fn list_low_stock(&self, store_id: StoreId) -> Result<Vec<InventoryRecord>, StoreError>;

    /// Records carrying `sku` across all stores, ordered by key.
    async fn list_by_sku(&self, sku: &str) -> Result<Vec<InventoryRecord>, StoreError>;
}

#[async_trait]
impl<S> InventoryStore for Arc<S>
where
    S: InventoryStore + ?Sized,
{
    async fn load_for_update(&self, key: InventoryKey) -> Result<Option<InventoryRecord>, StoreError> {
        (**self).load_for_update(key).await
    }

    async fn conditional_save(
        &self,
        record: InventoryRecord,
        expected: ExpectedVersion,
    ) -> Result<InventoryRecord, StoreError> {
        (**self).conditional_save(record, expected).await
    }

    async fn save(&self, record: InventoryRecord) -> Result<InventoryRecord, StoreError> {
        (**self).save(record).await
    }

    async fn get(&self, key: InventoryKey) -> Result<Option<InventoryRecord>, StoreError> {
        (**self).get(key).await
    }

    async fn list_by_store(&self, store_id: StoreId) -> Result<Vec<InventoryRecord>, StoreError> {
        (**self).list_by_store(store_id).await
    }

    async fn list_low_stock(&self, store_id: StoreId) -> Result<Vec<InventoryRecord>, StoreError> {
        (**self).list_low_stock(store_id).await
    }

    async fn list_by_sku(&self, sku: &str) -> Result<Vec<InventoryRecord>, StoreError> {
        (**self).list_by_sku(sku).await
    }
}
