//! Reservation tokens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::ReservationId;

use crate::record::InventoryKey;

/// Opaque receipt for one granted reservation.
///
/// The ledger does not keep a registry of tokens: `release` works on
/// quantities alone, so callers doing partial releases track the remainder
/// themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationToken {
    pub id: ReservationId,
    pub key: InventoryKey,
    pub quantity: i64,
    pub reserved_at: DateTime<Utc>,
}

impl ReservationToken {
    pub fn issue(key: InventoryKey, quantity: i64, reserved_at: DateTime<Utc>) -> Self {
        Self {
            id: ReservationId::new(),
            key,
            quantity,
            reserved_at,
        }
    }
}
