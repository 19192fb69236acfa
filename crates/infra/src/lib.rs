//! Infrastructure layer: persistence, key serialization, the reservation
//! engine and its configuration.

pub mod concurrency;
pub mod config;
pub mod engine;
pub mod reorder;
pub mod store;


pub use concurrency::{
    ConcurrencyStrategy, KeyGuard, KeyedConcurrencyController, KeyedLockController,
    OptimisticController,
};
pub use config::{ConfigError, EngineConfig};
pub use engine::ReservationEngine;
pub use reorder::{ChannelReorderSink, InMemoryReorderSink, TracingReorderSink};
pub use store::{InMemoryInventoryStore, InventoryStore, PostgresInventoryStore, StoreError};
