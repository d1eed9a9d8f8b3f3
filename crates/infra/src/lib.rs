//! Infrastructure layer: the stock persistence boundary and valuation reporting.
//!
//! The costing arithmetic lives in `yaadbooks-costing`; this crate owns the
//! transactional read-compute-write around it (Postgres and an in-memory twin
//! for tests/dev) and the read-only valuation reporter.

pub mod reporter;
pub mod stock_store;

pub use reporter::{CategoryValuation, ValuationReporter, ValuationSummary};
pub use stock_store::{
    InMemoryStockStore, MovementReceipt, MovementReference, MovementRequest, PostgresStockStore,
    ProductStock, StockMovementRecord, StockStore, StoreError,
};
