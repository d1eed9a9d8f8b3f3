//! Weighted-average inventory costing (pure domain logic).
//!
//! This crate contains the Valuation Ledger: deterministic arithmetic that
//! turns a product's current `(quantity, average_cost)` state plus a movement
//! into the post-movement state and the movement's monetary value. No IO, no
//! HTTP, no storage — the transactional boundary lives in `yaadbooks-infra`.

pub mod ledger;
pub mod movement;

pub use ledger::{plan_movement, MovementPlan, ValuationState};
pub use movement::{Direction, MovementType};
