//! Reorder detection.
//!
//! `needs_reorder` is a pure function of a record. The [`ReorderMonitor`]
//! compares the record before and after a mutation and decides whether a
//! [`ReorderSignal`] goes out. Delivery is someone else's problem: a
//! [`ReorderSink`] must accept signals without blocking, and its failures never
//! reach the mutation that produced them.

use core::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockledger_core::{ProductId, StoreId};

use crate::record::InventoryRecord;

/// `available <= reorder_point`.
pub fn needs_reorder(record: &InventoryRecord) -> bool {
    record.available() <= record.reorder_point()
}

/// When the monitor emits.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReorderTrigger {
    /// Emit only when a mutation moves the record from not needing reorder to
    /// needing it. Records created by the mutation count as not needing it
    /// beforehand.
    #[default]
    Crossing,
    /// Emit after every mutation that leaves the record needing reorder.
    Level,
}

impl FromStr for ReorderTrigger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "crossing" => Ok(Self::Crossing),
            "level" => Ok(Self::Level),
            other => Err(format!("unknown reorder trigger '{other}' (expected crossing|level)")),
        }
    }
}

/// Restock request for the procurement/alerting side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderSignal {
    pub store_id: StoreId,
    pub product_id: ProductId,
    pub sku: Option<String>,
    pub available: i64,
    pub reorder_quantity: i64,
    pub detected_at: DateTime<Utc>,
}

impl ReorderSignal {
    pub fn for_record(record: &InventoryRecord, detected_at: DateTime<Utc>) -> Self {
        let key = record.key();
        Self {
            store_id: key.store_id,
            product_id: key.product_id,
            sku: record.sku().map(str::to_string),
            available: record.available(),
            reorder_quantity: record.reorder_quantity(),
            detected_at,
        }
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ReorderMonitor {
    trigger: ReorderTrigger,
}

impl ReorderMonitor {
    pub fn new(trigger: ReorderTrigger) -> Self {
        Self { trigger }
    }

    pub fn trigger(&self) -> ReorderTrigger {
        self.trigger
    }

    /// Decide whether the transition `prior -> current` should signal.
    pub fn evaluate(
        &self,
        prior: Option<&InventoryRecord>,
        current: &InventoryRecord,
        now: DateTime<Utc>,
    ) -> Option<ReorderSignal> {
        if !needs_reorder(current) {
            return None;
        }

        let fire = match self.trigger {
            ReorderTrigger::Level => true,
            ReorderTrigger::Crossing => !prior.is_some_and(needs_reorder),
        };

        fire.then(|| ReorderSignal::for_record(current, now))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReorderSinkError {
    /// The sink cannot take more signals right now.
    #[error("reorder sink is full")]
    Full,

    /// The receiving side has gone away.
    #[error("reorder sink is closed")]
    Closed,

    #[error("reorder sink unavailable: {0}")]
    Unavailable(String),
}

/// Outbound boundary for reorder signals.
///
/// Implementations must return promptly; anything slow belongs behind a
/// queue.
pub trait ReorderSink: Send + Sync {
    fn emit(&self, signal: ReorderSignal) -> Result<(), ReorderSinkError>;
}

impl<S> ReorderSink for Arc<S>
where
    S: ReorderSink + ?Sized,
{
    fn emit(&self, signal: ReorderSignal) -> Result<(), ReorderSinkError> {
        (**self).emit(signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{InventoryKey, ItemSettings};

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn record(on_hand: i64, reorder_point: i64) -> InventoryRecord {
        let settings = ItemSettings {
            sku: Some("SKU-1".to_string()),
            reorder_point,
            reorder_quantity: 25,
        };
        let base = InventoryRecord::empty(InventoryKey::new(StoreId::new(), ProductId::new()), now())
            .configure(&settings, now())
            .unwrap();
        if on_hand == 0 {
            base
        } else {
            base.adjust(on_hand, now()).unwrap()
        }
    }

    #[test]
    fn available_at_reorder_point_needs_reorder() {
        let r = record(5, 5);
        assert!(needs_reorder(&r));
    }

    #[test]
    fn available_above_reorder_point_does_not() {
        let r = record(6, 5);
        assert!(!needs_reorder(&r));
    }

    #[test]
    fn crossing_emits_once_at_the_boundary() {
        let monitor = ReorderMonitor::new(ReorderTrigger::Crossing);
        let r0 = record(8, 5);

        let r1 = r0.reserve(2, now()).unwrap(); // available 6
        assert!(monitor.evaluate(Some(&r0), &r1, now()).is_none());

        let r2 = r1.reserve(1, now()).unwrap(); // available 5: crossing
        let signal = monitor.evaluate(Some(&r1), &r2, now()).unwrap();
        assert_eq!(signal.available, 5);
        assert_eq!(signal.reorder_quantity, 25);
        assert_eq!(signal.sku.as_deref(), Some("SKU-1"));

        let r3 = r2.reserve(1, now()).unwrap(); // still below
        assert!(monitor.evaluate(Some(&r2), &r3, now()).is_none());

        let r4 = r3.release(4, now()).unwrap(); // back above
        assert!(monitor.evaluate(Some(&r3), &r4, now()).is_none());

        let r5 = r4.reserve(3, now()).unwrap(); // crossing again
        assert!(monitor.evaluate(Some(&r4), &r5, now()).is_some());
    }

    #[test]
    fn level_emits_while_below() {
        let monitor = ReorderMonitor::new(ReorderTrigger::Level);
        let r0 = record(5, 5);
        let r1 = r0.reserve(1, now()).unwrap();
        assert!(monitor.evaluate(Some(&r0), &r1, now()).is_some());
    }

    #[test]
    fn newly_created_record_counts_as_crossing() {
        let monitor = ReorderMonitor::default();
        let r = record(0, 0);
        assert!(monitor.evaluate(None, &r, now()).is_some());
    }

    #[test]
    fn parses_trigger_names() {
        assert_eq!("Crossing".parse::<ReorderTrigger>().unwrap(), ReorderTrigger::Crossing);
        assert_eq!("level".parse::<ReorderTrigger>().unwrap(), ReorderTrigger::Level);
        assert!("edge".parse::<ReorderTrigger>().is_err());
    }
}
