//! The stock persistence boundary.
//!
//! This module defines the transactional seam for recording stock movements
//! and reading product valuation snapshots, without making storage
//! assumptions. Two implementations exist: Postgres (production, row-level
//! locking) and in-memory (tests/dev, one mutex over the state).

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryStockStore;
pub use postgres::PostgresStockStore;
pub use r#trait::{
    MovementReceipt, MovementReference, MovementRequest, ProductStock, StockMovementRecord,
    StockStore, StoreError,
};
