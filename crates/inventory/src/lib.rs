//! Inventory ledger domain.
//!
//! This crate contains the business rules for store inventory: the per
//! (store, product) stock record, its reservation/release/adjustment
//! transitions and the reorder signal derived from it. It is implemented
//! purely as deterministic domain logic (no IO, no locking, no storage).

pub mod error;
pub mod record;
pub mod reorder;
pub mod reservation;

pub use error::{InventoryError, InventoryResult};
pub use record::{
    Availability, InventoryKey, InventoryRecord, ItemSettings, RecordParts, StockStatus,
};
pub use reorder::{
    ReorderMonitor, ReorderSignal, ReorderSink, ReorderSinkError, ReorderTrigger, needs_reorder,
};
pub use reservation::ReservationToken;
