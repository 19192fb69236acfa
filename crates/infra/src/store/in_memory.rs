use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;

use stockledger_core::{ExpectedVersion, StoreId};
use stockledger_inventory::{InventoryKey, InventoryRecord, needs_reorder};

use super::r#trait::{InventoryStore, StoreError};

/// In-memory inventory store.
///
/// Intended for tests/dev. Conditional writes are checked and applied under
/// one write lock, so it honours the same compare-and-swap contract as the
/// Postgres store.
#[derive(Debug)]
pub struct InMemoryInventoryStore {
    records: RwLock<HashMap<InventoryKey, InventoryRecord>>,
    next_id: AtomicI64,
}

impl Default for InMemoryInventoryStore {
    fn default() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> StoreError {
        StoreError::Backend("lock poisoned".to_string())
    }

    fn select(&self, filter: impl Fn(&InventoryRecord) -> bool) -> Result<Vec<InventoryRecord>, StoreError> {
        let records = self.records.read().map_err(|_| Self::poisoned())?;
        Ok(records.values().filter(|r| filter(r)).cloned().collect())
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn load_for_update(&self, key: InventoryKey) -> Result<Option<InventoryRecord>, StoreError> {
        self.get(key).await
    }

    async fn conditional_save(
        &self,
        record: InventoryRecord,
        expected: ExpectedVersion,
    ) -> Result<InventoryRecord, StoreError> {
        let key = record.key();
        let mut records = self.records.write().map_err(|_| Self::poisoned())?;

        let current = records.get(&key);
        expected
            .check(current.map(InventoryRecord::version))
            .map_err(|e| StoreError::Conflict(format!("{key}: {e}")))?;

        record
            .check_invariants()
            .map_err(|e| StoreError::Rejected(e.to_string()))?;

        let surrogate_id = match current.and_then(InventoryRecord::surrogate_id) {
            Some(id) => id,
            None => self.next_id.fetch_add(1, Ordering::Relaxed),
        };

        let committed = record.committed(surrogate_id, expected.next());
        records.insert(key, committed.clone());
        Ok(committed)
    }

    async fn save(&self, record: InventoryRecord) -> Result<InventoryRecord, StoreError> {
        self.conditional_save(record, ExpectedVersion::Absent).await
    }

    async fn get(&self, key: InventoryKey) -> Result<Option<InventoryRecord>, StoreError> {
        let records = self.records.read().map_err(|_| Self::poisoned())?;
        Ok(records.get(&key).cloned())
    }

    async fn list_by_store(&self, store_id: StoreId) -> Result<Vec<InventoryRecord>, StoreError> {
        let mut out = self.select(|r| r.key().store_id == store_id)?;
        out.sort_by_key(|r| r.key().product_id);
        Ok(out)
    }

    async fn list_low_stock(&self, store_id: StoreId) -> Result<Vec<InventoryRecord>, StoreError> {
        let mut out = self.select(|r| r.key().store_id == store_id && needs_reorder(r))?;
        out.sort_by_key(|r| (r.available(), r.key().product_id));
        Ok(out)
    }

    async fn list_by_sku(&self, sku: &str) -> Result<Vec<InventoryRecord>, StoreError> {
        let mut out = self.select(|r| r.sku() == Some(sku))?;
        out.sort_by_key(|r| r.key());
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stockledger_core::ProductId;
    use stockledger_inventory::ItemSettings;

    fn test_key(store_id: StoreId) -> InventoryKey {
        InventoryKey::new(store_id, ProductId::new())
    }

    fn stocked(key: InventoryKey, on_hand: i64) -> InventoryRecord {
        InventoryRecord::empty(key, Utc::now()).adjust(on_hand, Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn save_assigns_id_and_first_version() {
        let store = InMemoryInventoryStore::new();
        let key = test_key(StoreId::new());

        let saved = store.save(stocked(key, 4)).await.unwrap();
        assert_eq!(saved.version(), 1);
        assert!(saved.surrogate_id().is_some());
        assert_eq!(store.get(key).await.unwrap(), Some(saved));
    }

    #[tokio::test]
    async fn save_conflicts_when_record_exists() {
        let store = InMemoryInventoryStore::new();
        let key = test_key(StoreId::new());
        store.save(stocked(key, 1)).await.unwrap();

        let err = store.save(stocked(key, 2)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn stale_version_is_rejected() {
        let store = InMemoryInventoryStore::new();
        let key = test_key(StoreId::new());
        let v1 = store.save(stocked(key, 10)).await.unwrap();

        let v2 = store
            .conditional_save(v1.reserve(3, Utc::now()).unwrap(), ExpectedVersion::Exact(1))
            .await
            .unwrap();
        assert_eq!(v2.version(), 2);
        assert_eq!(v2.surrogate_id(), v1.surrogate_id());

        // A writer still holding version 1 loses.
        let err = store
            .conditional_save(v1.reserve(9, Utc::now()).unwrap(), ExpectedVersion::Exact(1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.get(key).await.unwrap().unwrap().reserved(), 3);
    }

    #[tokio::test]
    async fn list_queries_filter_and_order() {
        let store = InMemoryInventoryStore::new();
        let store_id = StoreId::new();
        let low = ItemSettings {
            sku: Some("SKU-LOW".to_string()),
            reorder_point: 5,
            reorder_quantity: 10,
        };

        let a = store.save(stocked(test_key(store_id), 3).configure(&low, Utc::now()).unwrap()).await.unwrap();
        let b = store.save(stocked(test_key(store_id), 1).configure(&low, Utc::now()).unwrap()).await.unwrap();
        store.save(stocked(test_key(store_id), 50)).await.unwrap();
        store.save(stocked(test_key(StoreId::new()), 2)).await.unwrap();

        assert_eq!(store.list_by_store(store_id).await.unwrap().len(), 3);

        let low_stock = store.list_low_stock(store_id).await.unwrap();
        assert_eq!(low_stock, vec![b.clone(), a.clone()]);

        let by_sku = store.list_by_sku("SKU-LOW").await.unwrap();
        assert_eq!(by_sku.len(), 2);
        assert!(store.list_by_sku("SKU-NONE").await.unwrap().is_empty());
    }
}
