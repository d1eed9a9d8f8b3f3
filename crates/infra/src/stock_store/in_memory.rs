use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use yaadbooks_core::{CompanyId, DomainError, MovementId, ProductId};
use yaadbooks_costing::plan_movement;

use super::r#trait::{
    MovementReceipt, MovementRequest, ProductStock, StockMovementRecord, StockStore, StoreError,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct StockKey {
    company_id: CompanyId,
    product_id: ProductId,
}

#[derive(Debug)]
struct ProductState {
    stock: ProductStock,
    movements: Vec<StockMovementRecord>,
}

/// In-memory stock store.
///
/// Intended for tests/dev. The single mutex gives the same per-product
/// serialization the Postgres row lock gives (coarser, but correct): two
/// concurrent outgoing movements can never both read the same snapshot.
#[derive(Debug, Default)]
pub struct InMemoryStockStore {
    state: Mutex<HashMap<StockKey, ProductState>>,
}

impl InMemoryStockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a product snapshot.
    ///
    /// Product CRUD itself is out of scope for this core; tests and dev
    /// bootstrap create snapshots directly.
    pub fn insert_product(&self, stock: ProductStock) -> Result<(), StoreError> {
        let key = StockKey {
            company_id: stock.company_id,
            product_id: stock.product_id,
        };
        let mut state = self
            .state
            .lock()
            .map_err(|_| StoreError::storage("lock poisoned"))?;
        state.insert(
            key,
            ProductState {
                stock,
                movements: Vec::new(),
            },
        );
        Ok(())
    }
}

#[async_trait]
impl StockStore for InMemoryStockStore {
    async fn record_movement(
        &self,
        request: &MovementRequest,
    ) -> Result<MovementReceipt, StoreError> {
        let key = StockKey {
            company_id: request.company_id,
            product_id: request.product_id,
        };

        let mut state = self
            .state
            .lock()
            .map_err(|_| StoreError::storage("lock poisoned"))?;
        let product = state.get_mut(&key).ok_or(DomainError::NotFound)?;

        // Compute before touching anything; a rejected plan leaves both the
        // snapshot and the ledger untouched.
        let plan = plan_movement(
            &product.stock.valuation_state(),
            request.movement_type,
            request.quantity,
            request.unit_cost,
        )
        .map_err(StoreError::from)?;

        let now = Utc::now();
        let record = StockMovementRecord::from_plan(request, &plan, MovementId::new(), now);
        let receipt = MovementReceipt::from_record(&record);

        product.stock.apply_plan(&plan, now);
        product.movements.push(record);

        Ok(receipt)
    }

    async fn product_stock(
        &self,
        company_id: CompanyId,
        product_id: ProductId,
    ) -> Result<Option<ProductStock>, StoreError> {
        let state = self
            .state
            .lock()
            .map_err(|_| StoreError::storage("lock poisoned"))?;
        Ok(state
            .get(&StockKey {
                company_id,
                product_id,
            })
            .map(|p| p.stock.clone()))
    }

    async fn company_stock(
        &self,
        company_id: CompanyId,
    ) -> Result<Vec<ProductStock>, StoreError> {
        let state = self
            .state
            .lock()
            .map_err(|_| StoreError::storage("lock poisoned"))?;
        let mut stocks: Vec<ProductStock> = state
            .values()
            .filter(|p| p.stock.company_id == company_id)
            .map(|p| p.stock.clone())
            .collect();
        stocks.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(stocks)
    }

    async fn movements(
        &self,
        company_id: CompanyId,
        product_id: ProductId,
    ) -> Result<Vec<StockMovementRecord>, StoreError> {
        let state = self
            .state
            .lock()
            .map_err(|_| StoreError::storage("lock poisoned"))?;
        Ok(state
            .get(&StockKey {
                company_id,
                product_id,
            })
            .map(|p| p.movements.clone())
            .unwrap_or_default())
    }
}
