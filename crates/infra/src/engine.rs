//! Reservation engine (application-level orchestration).
//!
//! Every mutation follows the same pipeline:
//!
//! ```text
//! request
//!   ↓
//! 1. Acquire the (store, product) key from the concurrency controller
//!   ↓
//! 2. Load the current record (absent = zero stock)
//!   ↓
//! 3. Decide: pure transition on `InventoryRecord`, may reject
//!   ↓
//! 4. Conditional write at the version read in step 2
//!      conflict → jittered exponential back off, go to 2 (bounded)
//!   ↓
//! 5. Release the key
//!   ↓
//! 6. Evaluate the reorder monitor, emit to the sink (best effort)
//! ```
//!
//! A failed step leaves the stored record untouched. Dropping the returned
//! future before step 4 completes has no effect on the ledger.
//!
//! Reads (`get_availability`, the `list_*` queries) go straight to the store
//! and never touch the controller.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, instrument, warn};

use stockledger_core::{ExpectedVersion, ProductId, StoreId};
use stockledger_inventory::{
    Availability, InventoryError, InventoryKey, InventoryRecord, InventoryResult, ItemSettings,
    ReorderMonitor, ReorderSink, ReservationToken,
};

use crate::concurrency::{
    ConcurrencyStrategy, KeyedConcurrencyController, KeyedLockController, OptimisticController,
};
use crate::config::EngineConfig;
use crate::store::{InventoryStore, StoreError};

/// Outcome of the decide step.
enum Decision {
    /// Persist this record.
    Write(InventoryRecord),
    /// Nothing to persist; hand this snapshot back to the caller.
    Unchanged(InventoryRecord),
}

/// Enforces the ledger invariants under concurrent access.
///
/// Generic over the store and the reorder sink; both are usually wrapped in
/// `Arc` so one engine can be shared by many tasks.
pub struct ReservationEngine<S, R> {
    store: S,
    sink: R,
    controller: Arc<dyn KeyedConcurrencyController>,
    monitor: ReorderMonitor,
    config: EngineConfig,
}

impl<S, R> ReservationEngine<S, R>
where
    S: InventoryStore,
    R: ReorderSink,
{
    /// Build an engine whose concurrency controller follows `config.strategy`.
    pub fn new(store: S, sink: R, config: EngineConfig) -> Self {
        let controller: Arc<dyn KeyedConcurrencyController> = match config.strategy {
            ConcurrencyStrategy::KeyedLock => Arc::new(KeyedLockController::new(config.lock_timeout)),
            ConcurrencyStrategy::Optimistic => Arc::new(OptimisticController::new()),
        };
        Self::with_controller(store, sink, controller, config)
    }

    /// Build an engine around an existing controller (e.g. one shared with
    /// another engine over the same store).
    pub fn with_controller(
        store: S,
        sink: R,
        controller: Arc<dyn KeyedConcurrencyController>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            sink,
            controller,
            monitor: ReorderMonitor::new(config.reorder_trigger),
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn sink(&self) -> &R {
        &self.sink
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// `quantity_on_hand += delta`, creating the record on first use.
    #[instrument(skip(self), fields(store_id = %store_id, product_id = %product_id))]
    pub async fn adjust_on_hand(
        &self,
        store_id: StoreId,
        product_id: ProductId,
        delta: i64,
    ) -> InventoryResult<InventoryRecord> {
        let key = InventoryKey::new(store_id, product_id);
        self.mutate(key, "adjust_on_hand", |prior, now| {
            let base = prior.cloned().unwrap_or_else(|| InventoryRecord::empty(key, now));
            base.adjust(delta, now).map(Decision::Write)
        })
        .await
    }

    /// Hold `quantity` units if they are available right now.
    #[instrument(skip(self), fields(store_id = %store_id, product_id = %product_id))]
    pub async fn reserve(
        &self,
        store_id: StoreId,
        product_id: ProductId,
        quantity: i64,
    ) -> InventoryResult<(InventoryRecord, ReservationToken)> {
        let key = InventoryKey::new(store_id, product_id);
        let record = self
            .mutate(key, "reserve", |prior, now| {
                let base = prior.cloned().unwrap_or_else(|| InventoryRecord::empty(key, now));
                base.reserve(quantity, now).map(Decision::Write)
            })
            .await?;

        let token = ReservationToken::issue(key, quantity, record.updated_at());
        debug!(reservation_id = %token.id, quantity, available = record.available(), "reservation granted");
        Ok((record, token))
    }

    /// Give back up to `quantity` reserved units. Over-release is clamped.
    #[instrument(skip(self), fields(store_id = %store_id, product_id = %product_id))]
    pub async fn release(
        &self,
        store_id: StoreId,
        product_id: ProductId,
        quantity: i64,
    ) -> InventoryResult<InventoryRecord> {
        let key = InventoryKey::new(store_id, product_id);
        self.mutate(key, "release", |prior, now| match prior {
            Some(record) => record.release(quantity, now).map(Decision::Write),
            // Nothing was ever reserved here; validate and report zero stock.
            None => InventoryRecord::empty(key, now)
                .release(quantity, now)
                .map(Decision::Unchanged),
        })
        .await
    }

    /// Release exactly what `token` reserved.
    pub async fn release_reservation(&self, token: &ReservationToken) -> InventoryResult<InventoryRecord> {
        self.release(token.key.store_id, token.key.product_id, token.quantity)
            .await
    }

    /// Set the SKU and restock policy of an item. Counters are untouched.
    #[instrument(skip(self, settings), fields(store_id = %store_id, product_id = %product_id))]
    pub async fn configure_item(
        &self,
        store_id: StoreId,
        product_id: ProductId,
        settings: ItemSettings,
    ) -> InventoryResult<InventoryRecord> {
        settings.validate()?;
        let key = InventoryKey::new(store_id, product_id);
        self.mutate(key, "configure_item", |prior, now| {
            let base = prior.cloned().unwrap_or_else(|| InventoryRecord::empty(key, now));
            base.configure(&settings, now).map(Decision::Write)
        })
        .await
    }

    /// Current counters. Absent records read as zero stock.
    pub async fn get_availability(
        &self,
        store_id: StoreId,
        product_id: ProductId,
    ) -> InventoryResult<Availability> {
        let record = self
            .store
            .get(InventoryKey::new(store_id, product_id))
            .await?;
        Ok(Availability::of(record.as_ref()))
    }

    pub async fn list_by_store(&self, store_id: StoreId) -> InventoryResult<Vec<InventoryRecord>> {
        Ok(self.store.list_by_store(store_id).await?)
    }

    pub async fn list_low_stock(&self, store_id: StoreId) -> InventoryResult<Vec<InventoryRecord>> {
        Ok(self.store.list_low_stock(store_id).await?)
    }

    pub async fn list_by_sku(&self, sku: &str) -> InventoryResult<Vec<InventoryRecord>> {
        Ok(self.store.list_by_sku(sku.trim()).await?)
    }

    /// Run one read-check-write under the key's serialization discipline.
    async fn mutate<F>(&self, key: InventoryKey, op: &'static str, mut decide: F) -> InventoryResult<InventoryRecord>
    where
        F: FnMut(Option<&InventoryRecord>, DateTime<Utc>) -> InventoryResult<Decision> + Send,
    {
        let guard = self.controller.acquire(key).await?;

        let mut conflicts = 0u32;
        let (prior, committed) = loop {
            let prior = self.store.load_for_update(key).await?;
            let now = Utc::now();

            let next = match decide(prior.as_ref(), now)? {
                Decision::Write(next) => next,
                Decision::Unchanged(snapshot) => return Ok(snapshot),
            };
            next.check_invariants()?;

            let written = match ExpectedVersion::from_prior(prior.as_ref().map(InventoryRecord::version)) {
                ExpectedVersion::Absent => self.store.save(next).await,
                expected => self.store.conditional_save(next, expected).await,
            };

            match written {
                Ok(committed) => break (prior, committed),
                Err(StoreError::Conflict(reason)) => {
                    if conflicts >= self.config.max_conflict_retries {
                        warn!(%key, op, conflicts, %reason, "conflict retries exhausted");
                        return Err(InventoryError::timed_out(format!(
                            "{op} on {key}: gave up after {} conflicting writes",
                            conflicts + 1
                        )));
                    }
                    conflicts += 1;
                    debug!(%key, op, attempt = conflicts, %reason, "write conflict, retrying");
                    self.backoff(conflicts).await;
                }
                Err(other) => return Err(other.into()),
            }
        };

        drop(guard);

        debug!(
            %key,
            op,
            version = committed.version(),
            on_hand = committed.quantity_on_hand(),
            reserved = committed.reserved(),
            "mutation committed"
        );
        self.signal_reorder(prior.as_ref(), &committed);
        Ok(committed)
    }

    async fn backoff(&self, attempt: u32) {
        let delay = self.config.retry_delay(attempt);
        if delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(delay).await;
        }
    }

    /// Sink failures (including panics) are logged and dropped.
    fn signal_reorder(&self, prior: Option<&InventoryRecord>, current: &InventoryRecord) {
        let Some(signal) = self.monitor.evaluate(prior, current, Utc::now()) else {
            return;
        };
        let key = current.key();

        match std::panic::catch_unwind(AssertUnwindSafe(|| self.sink.emit(signal))) {
            Ok(Ok(())) => debug!(%key, available = current.available(), "reorder signal emitted"),
            Ok(Err(e)) => warn!(%key, error = %e, "reorder signal dropped"),
            Err(_) => error!(%key, "reorder sink panicked; signal dropped"),
        }
    }
}

impl<S, R> core::fmt::Debug for ReservationEngine<S, R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ReservationEngine")
            .field("monitor", &self.monitor)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
