use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use yaadbooks_core::rounding::round_money;
use yaadbooks_core::{CompanyId, DomainError, MovementId, ProductId, UserId};
use yaadbooks_costing::{MovementPlan, MovementType, ValuationState};

/// A product's current valuation snapshot.
///
/// This is the denormalized cache of "apply all movements in order": stored on
/// the product row for fast reads, overwritten by every recorded movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductStock {
    pub company_id: CompanyId,
    pub product_id: ProductId,
    pub name: String,
    pub category: Option<String>,
    /// On-hand quantity (4 dp, never negative).
    pub quantity: Decimal,
    /// Weighted-average unit cost (4 dp).
    pub average_cost: Decimal,
    /// Last-known purchase unit cost; valuation fallback for products never
    /// yet costed via the average.
    pub cost_price: Decimal,
    /// Low-stock threshold for the inventory dashboard.
    pub reorder_level: Decimal,
    pub active: bool,
    pub updated_at: DateTime<Utc>,
}

impl ProductStock {
    pub fn valuation_state(&self) -> ValuationState {
        ValuationState::new(self.quantity, self.average_cost)
    }

    /// Unit cost used for reporting: the average when it exists, else the
    /// last purchase cost.
    pub fn valuation_unit_cost(&self) -> Decimal {
        if self.average_cost.is_zero() {
            self.cost_price
        } else {
            self.average_cost
        }
    }

    /// On-hand value at the reporting unit cost (2 dp).
    pub fn on_hand_value(&self) -> Decimal {
        round_money(self.quantity * self.valuation_unit_cost())
    }

    /// Fold a computed movement plan into the snapshot.
    ///
    /// Purchases also refresh `cost_price` so the "last purchase cost" field
    /// stays current for products not yet costed via the average.
    pub fn apply_plan(&mut self, plan: &MovementPlan, now: DateTime<Utc>) {
        self.quantity = plan.new_quantity;
        self.average_cost = plan.new_average_cost;
        if plan.movement_type == MovementType::Purchase {
            self.cost_price = plan.unit_cost;
        }
        self.updated_at = now;
    }
}

/// Free-form linkage to the document that caused a movement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementReference {
    /// Originating document type (e.g. "order", "goods_receipt").
    pub document_type: Option<String>,
    pub document_id: Option<String>,
    pub description: Option<String>,
}

/// A movement to record.
///
/// `quantity` is a positive magnitude for every movement type except
/// ADJUSTMENT, where the caller's sign decides the direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementRequest {
    pub company_id: CompanyId,
    pub product_id: ProductId,
    pub movement_type: MovementType,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub reference: MovementReference,
    pub actor: Option<UserId>,
}

/// One immutable row of the per-product movement ledger.
///
/// Created once per movement, never mutated or deleted. Carries the
/// post-movement snapshot so the ledger alone can reconstruct history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovementRecord {
    pub movement_id: MovementId,
    pub company_id: CompanyId,
    pub product_id: ProductId,
    pub movement_type: MovementType,
    /// Signed quantity (positive = stock increase).
    pub quantity: Decimal,
    /// Unit cost applied to this movement (incoming: supplied cost,
    /// outgoing: the average at the time).
    pub unit_cost: Decimal,
    /// Inventory value added (incoming) or COGS (outgoing), 2 dp.
    pub movement_value: Decimal,
    pub resulting_quantity: Decimal,
    pub resulting_average_cost: Decimal,
    pub reference: MovementReference,
    pub actor: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

impl StockMovementRecord {
    /// Build the ledger row for a computed plan.
    pub fn from_plan(
        request: &MovementRequest,
        plan: &MovementPlan,
        movement_id: MovementId,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            movement_id,
            company_id: request.company_id,
            product_id: request.product_id,
            movement_type: plan.movement_type,
            quantity: plan.signed_quantity,
            unit_cost: plan.unit_cost,
            movement_value: plan.movement_value,
            resulting_quantity: plan.new_quantity,
            resulting_average_cost: plan.new_average_cost,
            reference: request.reference.clone(),
            actor: request.actor,
            occurred_at,
        }
    }
}

/// Result handed back to the caller after a recorded movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementReceipt {
    pub movement_id: MovementId,
    pub movement_value: Decimal,
    pub resulting_quantity: Decimal,
    pub resulting_average_cost: Decimal,
}

impl MovementReceipt {
    pub fn from_record(record: &StockMovementRecord) -> Self {
        Self {
            movement_id: record.movement_id,
            movement_value: record.movement_value,
            resulting_quantity: record.resulting_quantity,
            resulting_average_cost: record.resulting_average_cost,
        }
    }
}

/// Stock store operation error.
///
/// Domain failures (not found, insufficient stock, invalid input) pass
/// through unchanged so callers can tell business rejections apart from
/// storage trouble.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl StoreError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}

/// Transactional stock persistence boundary.
///
/// Implementations must serialize `record_movement` per product: the read of
/// the current snapshot, the costing computation, the ledger append and the
/// snapshot overwrite happen as one atomic unit, or not at all. Different
/// products may move fully in parallel; there is no cross-product ordering.
#[async_trait]
pub trait StockStore: Send + Sync {
    /// Atomically apply one movement and return its receipt.
    ///
    /// Fails with [`DomainError::NotFound`] when the product does not exist
    /// or belongs to another company, and with
    /// [`DomainError::InsufficientStock`] when an outgoing magnitude exceeds
    /// the on-hand quantity — in both cases nothing is written.
    async fn record_movement(&self, request: &MovementRequest)
        -> Result<MovementReceipt, StoreError>;

    /// Point read of one product's snapshot, company-scoped.
    async fn product_stock(
        &self,
        company_id: CompanyId,
        product_id: ProductId,
    ) -> Result<Option<ProductStock>, StoreError>;

    /// All product snapshots of a company (for reporting).
    async fn company_stock(&self, company_id: CompanyId)
        -> Result<Vec<ProductStock>, StoreError>;

    /// The append-only movement ledger for one product, in application order.
    async fn movements(
        &self,
        company_id: CompanyId,
        product_id: ProductId,
    ) -> Result<Vec<StockMovementRecord>, StoreError>;
}

#[async_trait]
impl<S> StockStore for Arc<S>
where
    S: StockStore + ?Sized,
{
    async fn record_movement(
        &self,
        request: &MovementRequest,
    ) -> Result<MovementReceipt, StoreError> {
        (**self).record_movement(request).await
    }

    async fn product_stock(
        &self,
        company_id: CompanyId,
        product_id: ProductId,
    ) -> Result<Option<ProductStock>, StoreError> {
        (**self).product_stock(company_id, product_id).await
    }

    async fn company_stock(
        &self,
        company_id: CompanyId,
    ) -> Result<Vec<ProductStock>, StoreError> {
        (**self).company_stock(company_id).await
    }

    async fn movements(
        &self,
        company_id: CompanyId,
        product_id: ProductId,
    ) -> Result<Vec<StockMovementRecord>, StoreError> {
        (**self).movements(company_id, product_id).await
    }
}
