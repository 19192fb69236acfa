//! `stockledger-core`: shared building blocks for the inventory ledger.
//!
//! Identifiers, the domain error used for identifier and version failures,
//! and optimistic-concurrency primitives. No infrastructure concerns.

pub mod error;
pub mod id;
pub mod version;

pub use error::{DomainError, DomainResult};
pub use id::{ProductId, ReservationId, StoreId};
pub use version::ExpectedVersion;
