//! `yaadbooks-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! strongly-typed identifiers, the domain error model, and the rounding policy
//! shared by the costing and persistence layers.

pub mod error;
pub mod id;
pub mod rounding;

pub use error::{DomainError, DomainResult};
pub use id::{CompanyId, MovementId, ProductId, UserId};
pub use rounding::{round_cost, round_money, round_quantity, COST_DP, MONEY_DP, QUANTITY_DP};
