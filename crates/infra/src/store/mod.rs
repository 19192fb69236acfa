//! Inventory persistence boundary.
//!
//! The engine only needs keyed reads and compare-and-swap writes; any backend
//! that can offer those satisfies the contract.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryInventoryStore;
pub use postgres::PostgresInventoryStore;
pub use r#trait::{InventoryStore, StoreError};
