use async_trait::async_trait;

use stockledger_inventory::{InventoryKey, InventoryResult};

use super::{KeyGuard, KeyedConcurrencyController};

/// Lock-free controller: the store's conditional writes are the only
/// serialization point.
#[derive(Debug, Default, Clone, Copy)]
pub struct OptimisticController;

impl OptimisticController {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl KeyedConcurrencyController for OptimisticController {
    async fn acquire(&self, _key: InventoryKey) -> InventoryResult<KeyGuard> {
        Ok(KeyGuard::unlocked())
    }
}
