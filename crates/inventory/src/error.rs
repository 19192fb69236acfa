//! Ledger error taxonomy.

use thiserror::Error;

pub type InventoryResult<T> = Result<T, InventoryError>;

/// Failures surfaced by ledger operations.
///
/// Every failing mutation leaves the record untouched; callers never observe a
/// partial change.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InventoryError {
    /// A reservation asked for more than is currently available.
    ///
    /// Recoverable by the caller (smaller quantity, backorder). Never retried
    /// by the engine.
    #[error("insufficient inventory: requested {requested}, available {available}")]
    InsufficientInventory { requested: i64, available: i64 },

    /// An on-hand adjustment would leave the record below zero or below its
    /// reservations. Indicates a caller bug.
    #[error("invalid adjustment: delta {delta} against on_hand {on_hand} (reserved {reserved})")]
    InvalidAdjustment {
        on_hand: i64,
        reserved: i64,
        delta: i64,
    },

    /// A quantity or delta that must be positive (or non-zero) was not.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(i64),

    /// Restock policy values were out of range.
    #[error("invalid reorder policy: {0}")]
    InvalidPolicy(String),

    /// Key serialization could not be obtained in time, or conditional-write
    /// retries were exhausted.
    #[error("operation timed out: {0}")]
    OperationTimedOut(String),

    /// A record failed its invariants (e.g. corrupt persisted state).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// The persistence layer failed.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl InventoryError {
    pub fn timed_out(msg: impl Into<String>) -> Self {
        Self::OperationTimedOut(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Errors caused by contention rather than by the request itself.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::OperationTimedOut(_) | Self::Storage(_))
    }
}
