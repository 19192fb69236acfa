use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{ProductId, StoreId};

use crate::error::{InventoryError, InventoryResult};

/// Composite identity of a stock counter: one product at one store.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InventoryKey {
    pub store_id: StoreId,
    pub product_id: ProductId,
}

impl InventoryKey {
    pub fn new(store_id: StoreId, product_id: ProductId) -> Self {
        Self {
            store_id,
            product_id,
        }
    }
}

impl core::fmt::Display for InventoryKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.store_id, self.product_id)
    }
}

/// Observable stock state. "Needs reorder" is an orthogonal flag, see
/// [`crate::needs_reorder`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockStatus {
    InStock,
    OutOfStock,
}

/// Per-(store, product) stock counter.
///
/// Fields are private so that `available` can only ever be derived and every
/// state change goes through a checked transition. Transitions are pure: they
/// return the next record and leave `self` untouched, so a rejected operation
/// cannot leak a partial change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryRecord {
    id: Option<i64>,
    key: InventoryKey,
    sku: Option<String>,
    quantity_on_hand: i64,
    reserved: i64,
    reorder_point: i64,
    reorder_quantity: i64,
    last_restocked_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
    version: u64,
}

/// Raw persisted fields, validated by [`InventoryRecord::from_parts`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordParts {
    pub id: Option<i64>,
    pub key: InventoryKey,
    pub sku: Option<String>,
    pub quantity_on_hand: i64,
    pub reserved: i64,
    pub reorder_point: i64,
    pub reorder_quantity: i64,
    pub last_restocked_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

/// Store-configured item settings (denormalized SKU + restock policy).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSettings {
    pub sku: Option<String>,
    pub reorder_point: i64,
    pub reorder_quantity: i64,
}

impl ItemSettings {
    pub fn validate(&self) -> InventoryResult<()> {
        if self.reorder_point < 0 {
            return Err(InventoryError::InvalidPolicy(format!(
                "reorder_point cannot be negative ({})",
                self.reorder_point
            )));
        }
        if self.reorder_quantity < 0 {
            return Err(InventoryError::InvalidPolicy(format!(
                "reorder_quantity cannot be negative ({})",
                self.reorder_quantity
            )));
        }
        if let Some(sku) = &self.sku {
            if sku.trim().is_empty() {
                return Err(InventoryError::InvalidPolicy("sku cannot be blank".to_string()));
            }
        }
        Ok(())
    }
}

/// Read-only snapshot of the three counters.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub available: i64,
    pub on_hand: i64,
    pub reserved: i64,
}

impl Availability {
    /// Absent records read as zero stock.
    pub fn of(record: Option<&InventoryRecord>) -> Self {
        record.map(InventoryRecord::availability).unwrap_or_default()
    }
}

impl InventoryRecord {
    /// Fresh, not-yet-persisted record with zero counters.
    pub fn empty(key: InventoryKey, now: DateTime<Utc>) -> Self {
        Self {
            id: None,
            key,
            sku: None,
            quantity_on_hand: 0,
            reserved: 0,
            reorder_point: 0,
            reorder_quantity: 0,
            last_restocked_at: None,
            updated_at: now,
            version: 0,
        }
    }

    /// Rebuild a record from persisted fields, rejecting states that break
    /// the ledger invariants.
    pub fn from_parts(parts: RecordParts) -> InventoryResult<Self> {
        let record = Self {
            id: parts.id,
            key: parts.key,
            sku: parts.sku,
            quantity_on_hand: parts.quantity_on_hand,
            reserved: parts.reserved,
            reorder_point: parts.reorder_point,
            reorder_quantity: parts.reorder_quantity,
            last_restocked_at: parts.last_restocked_at,
            updated_at: parts.updated_at,
            version: parts.version,
        };
        record.check_invariants()?;
        Ok(record)
    }

    pub fn into_parts(self) -> RecordParts {
        RecordParts {
            id: self.id,
            key: self.key,
            sku: self.sku,
            quantity_on_hand: self.quantity_on_hand,
            reserved: self.reserved,
            reorder_point: self.reorder_point,
            reorder_quantity: self.reorder_quantity,
            last_restocked_at: self.last_restocked_at,
            updated_at: self.updated_at,
            version: self.version,
        }
    }

    pub fn surrogate_id(&self) -> Option<i64> {
        self.id
    }

    pub fn key(&self) -> InventoryKey {
        self.key
    }

    pub fn sku(&self) -> Option<&str> {
        self.sku.as_deref()
    }

    pub fn quantity_on_hand(&self) -> i64 {
        self.quantity_on_hand
    }

    pub fn reserved(&self) -> i64 {
        self.reserved
    }

    pub fn available(&self) -> i64 {
        self.quantity_on_hand - self.reserved
    }

    pub fn reorder_point(&self) -> i64 {
        self.reorder_point
    }

    pub fn reorder_quantity(&self) -> i64 {
        self.reorder_quantity
    }

    pub fn last_restocked_at(&self) -> Option<DateTime<Utc>> {
        self.last_restocked_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Committed version; 0 means never persisted.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn status(&self) -> StockStatus {
        if self.available() > 0 {
            StockStatus::InStock
        } else {
            StockStatus::OutOfStock
        }
    }

    pub fn availability(&self) -> Availability {
        Availability {
            available: self.available(),
            on_hand: self.quantity_on_hand,
            reserved: self.reserved,
        }
    }

    /// Stamp storage-assigned fields after a successful write.
    pub fn committed(mut self, surrogate_id: i64, version: u64) -> Self {
        self.id = Some(surrogate_id);
        self.version = version;
        self
    }

    pub fn check_invariants(&self) -> InventoryResult<()> {
        if self.quantity_on_hand < 0 {
            return Err(InventoryError::invariant(format!(
                "quantity_on_hand is negative ({}) for {}",
                self.quantity_on_hand, self.key
            )));
        }
        if self.reserved < 0 {
            return Err(InventoryError::invariant(format!(
                "reserved is negative ({}) for {}",
                self.reserved, self.key
            )));
        }
        if self.available() < 0 {
            return Err(InventoryError::invariant(format!(
                "reserved ({}) exceeds on_hand ({}) for {}",
                self.reserved, self.quantity_on_hand, self.key
            )));
        }
        if self.reorder_point < 0 || self.reorder_quantity < 0 {
            return Err(InventoryError::invariant(format!(
                "negative reorder policy for {}",
                self.key
            )));
        }
        Ok(())
    }

    /// `quantity_on_hand += delta`.
    ///
    /// The result may not drop below zero nor below what is already reserved.
    /// Positive deltas count as a restock.
    pub fn adjust(&self, delta: i64, now: DateTime<Utc>) -> InventoryResult<Self> {
        if delta == 0 {
            return Err(InventoryError::InvalidQuantity(delta));
        }

        let invalid = || InventoryError::InvalidAdjustment {
            on_hand: self.quantity_on_hand,
            reserved: self.reserved,
            delta,
        };

        let on_hand = self.quantity_on_hand.checked_add(delta).ok_or_else(invalid)?;
        if on_hand < 0 || on_hand < self.reserved {
            return Err(invalid());
        }

        let mut next = self.clone();
        next.quantity_on_hand = on_hand;
        if delta > 0 {
            next.last_restocked_at = Some(now);
        }
        next.updated_at = now;
        Ok(next)
    }

    /// Hold `quantity` against an in-flight order if it is available.
    pub fn reserve(&self, quantity: i64, now: DateTime<Utc>) -> InventoryResult<Self> {
        if quantity <= 0 {
            return Err(InventoryError::InvalidQuantity(quantity));
        }

        let available = self.available();
        if available < quantity {
            return Err(InventoryError::InsufficientInventory {
                requested: quantity,
                available,
            });
        }

        let mut next = self.clone();
        next.reserved += quantity;
        next.updated_at = now;
        Ok(next)
    }

    /// Give back up to `quantity` reserved units; over-release is clamped.
    pub fn release(&self, quantity: i64, now: DateTime<Utc>) -> InventoryResult<Self> {
        if quantity <= 0 {
            return Err(InventoryError::InvalidQuantity(quantity));
        }

        let mut next = self.clone();
        next.reserved -= quantity.min(self.reserved);
        next.updated_at = now;
        Ok(next)
    }

    /// Apply store configuration. Counters are untouched.
    pub fn configure(&self, settings: &ItemSettings, now: DateTime<Utc>) -> InventoryResult<Self> {
        settings.validate()?;

        let mut next = self.clone();
        if let Some(sku) = &settings.sku {
            next.sku = Some(sku.trim().to_string());
        }
        next.reorder_point = settings.reorder_point;
        next.reorder_quantity = settings.reorder_quantity;
        next.updated_at = now;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_key() -> InventoryKey {
        InventoryKey::new(StoreId::new(), ProductId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn stocked(on_hand: i64) -> InventoryRecord {
        InventoryRecord::empty(test_key(), test_time())
            .adjust(on_hand, test_time())
            .unwrap()
    }

    #[test]
    fn reserve_then_oversized_reserve_leaves_state_unchanged() {
        let record = stocked(10);

        let record = record.reserve(7, test_time()).unwrap();
        assert_eq!(record.available(), 3);

        let err = record.reserve(5, test_time()).unwrap_err();
        assert_eq!(
            err,
            InventoryError::InsufficientInventory {
                requested: 5,
                available: 3
            }
        );
        assert_eq!(record.available(), 3);
        assert_eq!(record.reserved(), 7);
    }

    #[test]
    fn partial_release_returns_stock() {
        let record = stocked(10).reserve(7, test_time()).unwrap();

        let record = record.release(3, test_time()).unwrap();
        assert_eq!(record.reserved(), 4);
        assert_eq!(record.available(), 6);
    }

    #[test]
    fn over_release_clamps_to_zero() {
        let record = stocked(10).reserve(2, test_time()).unwrap();

        let record = record.release(50, test_time()).unwrap();
        assert_eq!(record.reserved(), 0);
        assert_eq!(record.available(), 10);
    }

    #[test]
    fn empty_record_is_out_of_stock() {
        let record = InventoryRecord::empty(test_key(), test_time());
        assert_eq!(record.status(), StockStatus::OutOfStock);

        let err = record.reserve(1, test_time()).unwrap_err();
        assert!(matches!(
            err,
            InventoryError::InsufficientInventory { requested: 1, available: 0 }
        ));
    }

    #[test]
    fn adjust_rejects_negative_on_hand() {
        let record = stocked(3);
        let err = record.adjust(-4, test_time()).unwrap_err();
        assert_eq!(
            err,
            InventoryError::InvalidAdjustment {
                on_hand: 3,
                reserved: 0,
                delta: -4
            }
        );
    }

    #[test]
    fn adjust_cannot_undercut_reservations() {
        let record = stocked(10).reserve(8, test_time()).unwrap();
        let err = record.adjust(-3, test_time()).unwrap_err();
        assert!(matches!(err, InventoryError::InvalidAdjustment { .. }));

        let record = record.adjust(-2, test_time()).unwrap();
        assert_eq!(record.available(), 0);
    }

    #[test]
    fn adjust_rejects_zero_delta() {
        let record = stocked(1);
        assert_eq!(
            record.adjust(0, test_time()).unwrap_err(),
            InventoryError::InvalidQuantity(0)
        );
    }

    #[test]
    fn only_restock_sets_last_restocked_at() {
        let t0 = test_time();
        let record = InventoryRecord::empty(test_key(), t0);
        assert!(record.last_restocked_at().is_none());

        let restocked = record.adjust(5, t0).unwrap();
        assert_eq!(restocked.last_restocked_at(), Some(t0));

        let t1 = t0 + chrono::Duration::seconds(5);
        let shrunk = restocked.adjust(-1, t1).unwrap();
        assert_eq!(shrunk.last_restocked_at(), Some(t0));
        assert_eq!(shrunk.updated_at(), t1);
    }

    #[test]
    fn non_positive_quantities_are_rejected() {
        let record = stocked(5);
        assert_eq!(
            record.reserve(0, test_time()).unwrap_err(),
            InventoryError::InvalidQuantity(0)
        );
        assert_eq!(
            record.release(-1, test_time()).unwrap_err(),
            InventoryError::InvalidQuantity(-1)
        );
    }

    #[test]
    fn configure_updates_policy_but_not_counters() {
        let record = stocked(5).reserve(1, test_time()).unwrap();
        let settings = ItemSettings {
            sku: Some(" SKU-42 ".to_string()),
            reorder_point: 2,
            reorder_quantity: 12,
        };

        let next = record.configure(&settings, test_time()).unwrap();
        assert_eq!(next.sku(), Some("SKU-42"));
        assert_eq!(next.reorder_point(), 2);
        assert_eq!(next.reorder_quantity(), 12);
        assert_eq!(next.availability(), record.availability());
    }

    #[test]
    fn configure_rejects_negative_policy() {
        let record = stocked(1);
        let settings = ItemSettings {
            sku: None,
            reorder_point: -1,
            reorder_quantity: 0,
        };
        assert!(matches!(
            record.configure(&settings, test_time()).unwrap_err(),
            InventoryError::InvalidPolicy(_)
        ));
    }

    #[test]
    fn from_parts_rejects_oversold_state() {
        let mut parts = stocked(2).into_parts();
        parts.reserved = 3;

        let err = InventoryRecord::from_parts(parts).unwrap_err();
        assert!(matches!(err, InventoryError::InvariantViolation(_)));
    }

    #[test]
    fn availability_of_absent_record_is_zero() {
        assert_eq!(Availability::of(None), Availability::default());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Adjust(i64),
        Reserve(i64),
        Release(i64),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (-50i64..50).prop_map(Op::Adjust),
            (-5i64..30).prop_map(Op::Reserve),
            (-5i64..30).prop_map(Op::Release),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 512,
            ..ProptestConfig::default()
        })]

        /// Property: whatever sequence of operations is attempted, every
        /// reachable record satisfies the ledger invariants and rejected
        /// operations change nothing.
        #[test]
        fn invariants_hold_for_any_operation_sequence(
            ops in prop::collection::vec(op_strategy(), 1..60)
        ) {
            let mut record = InventoryRecord::empty(test_key(), test_time());

            for op in ops {
                let before = record.clone();
                let result = match op {
                    Op::Adjust(d) => record.adjust(d, test_time()),
                    Op::Reserve(q) => record.reserve(q, test_time()),
                    Op::Release(q) => record.release(q, test_time()),
                };

                match result {
                    Ok(next) => record = next,
                    Err(_) => prop_assert_eq!(&record, &before),
                }

                prop_assert!(record.check_invariants().is_ok());
                prop_assert_eq!(record.available(), record.quantity_on_hand() - record.reserved());
                prop_assert!(record.reserved() >= 0);
                prop_assert!(record.quantity_on_hand() >= 0);
                prop_assert!(record.available() >= 0);
            }
        }
    }
}
