//! Postgres-backed stock store.
//!
//! Persists the product valuation snapshot (`product_stock`) and the
//! append-only movement ledger (`stock_movements`); see `schema.sql` for the
//! DDL this module assumes.
//!
//! ## Concurrency
//!
//! `record_movement` opens a transaction and locks the product row with
//! `SELECT … FOR UPDATE` before reading it. Concurrent movements of the same
//! product queue on the row lock, so the read-compute-write is serialized per
//! product; movements of different products proceed in parallel. The ledger
//! insert and the snapshot update commit together or not at all.
//!
//! ## Error mapping
//!
//! | Failure | Mapped to |
//! |---------|-----------|
//! | Unique violation (`23505`) | `DomainError::Conflict` (a writer slipped past the lock) |
//! | Check violation (`23514`) | `DomainError::Conflict` (e.g. the `quantity >= 0` CHECK) |
//! | Anything else from sqlx | `StoreError::Storage` |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use yaadbooks_core::{CompanyId, DomainError, MovementId, ProductId};
use yaadbooks_costing::plan_movement;

use super::r#trait::{
    MovementReceipt, MovementReference, MovementRequest, ProductStock, StockMovementRecord,
    StockStore, StoreError,
};

/// Postgres-backed stock store.
///
/// Cheap to clone; all operations go through the shared connection pool.
#[derive(Debug, Clone)]
pub struct PostgresStockStore {
    pool: Arc<PgPool>,
}

impl PostgresStockStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect using the `DATABASE_URL` environment variable.
    pub async fn connect() -> Result<Self, StoreError> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| StoreError::storage("DATABASE_URL not set"))?;
        let pool = PgPool::connect(&database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl StockStore for PostgresStockStore {
    #[instrument(
        skip(self, request),
        fields(
            company_id = %request.company_id,
            product_id = %request.product_id,
            movement_type = %request.movement_type,
        ),
        err
    )]
    async fn record_movement(
        &self,
        request: &MovementRequest,
    ) -> Result<MovementReceipt, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        // Row lock: serializes concurrent movements of the same product.
        let row: Option<ProductStockRow> = sqlx::query_as(
            r#"
            SELECT
                company_id, product_id, name, category,
                quantity, average_cost, cost_price, reorder_level,
                active, updated_at
            FROM product_stock
            WHERE company_id = $1 AND product_id = $2
            FOR UPDATE
            "#,
        )
        .bind(request.company_id.as_uuid())
        .bind(request.product_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("lock_product", e))?;

        let Some(row) = row else {
            return Err(DomainError::NotFound.into());
        };
        let mut stock = ProductStock::from(row);

        // A rejected plan (insufficient stock, invalid input) drops the
        // transaction here; nothing has been written yet.
        let plan = plan_movement(
            &stock.valuation_state(),
            request.movement_type,
            request.quantity,
            request.unit_cost,
        )
        .map_err(StoreError::from)?;

        let now = Utc::now();
        let record = StockMovementRecord::from_plan(request, &plan, MovementId::new(), now);
        stock.apply_plan(&plan, now);

        sqlx::query(
            r#"
            INSERT INTO stock_movements (
                movement_id, company_id, product_id, movement_type,
                quantity, unit_cost, movement_value,
                resulting_quantity, resulting_average_cost,
                document_type, document_id, description,
                actor_id, occurred_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(record.movement_id.as_uuid())
        .bind(record.company_id.as_uuid())
        .bind(record.product_id.as_uuid())
        .bind(record.movement_type.as_str())
        .bind(record.quantity)
        .bind(record.unit_cost)
        .bind(record.movement_value)
        .bind(record.resulting_quantity)
        .bind(record.resulting_average_cost)
        .bind(record.reference.document_type.as_deref())
        .bind(record.reference.document_id.as_deref())
        .bind(record.reference.description.as_deref())
        .bind(record.actor.map(|a| *a.as_uuid()))
        .bind(record.occurred_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_movement", e))?;

        sqlx::query(
            r#"
            UPDATE product_stock
            SET quantity = $3, average_cost = $4, cost_price = $5, updated_at = $6
            WHERE company_id = $1 AND product_id = $2
            "#,
        )
        .bind(stock.company_id.as_uuid())
        .bind(stock.product_id.as_uuid())
        .bind(stock.quantity)
        .bind(stock.average_cost)
        .bind(stock.cost_price)
        .bind(stock.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_snapshot", e))?;

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;

        Ok(MovementReceipt::from_record(&record))
    }

    #[instrument(skip(self), fields(company_id = %company_id, product_id = %product_id), err)]
    async fn product_stock(
        &self,
        company_id: CompanyId,
        product_id: ProductId,
    ) -> Result<Option<ProductStock>, StoreError> {
        let row: Option<ProductStockRow> = sqlx::query_as(
            r#"
            SELECT
                company_id, product_id, name, category,
                quantity, average_cost, cost_price, reorder_level,
                active, updated_at
            FROM product_stock
            WHERE company_id = $1 AND product_id = $2
            "#,
        )
        .bind(company_id.as_uuid())
        .bind(product_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("product_stock", e))?;

        Ok(row.map(ProductStock::from))
    }

    #[instrument(skip(self), fields(company_id = %company_id), err)]
    async fn company_stock(
        &self,
        company_id: CompanyId,
    ) -> Result<Vec<ProductStock>, StoreError> {
        let rows: Vec<ProductStockRow> = sqlx::query_as(
            r#"
            SELECT
                company_id, product_id, name, category,
                quantity, average_cost, cost_price, reorder_level,
                active, updated_at
            FROM product_stock
            WHERE company_id = $1
            ORDER BY name ASC
            "#,
        )
        .bind(company_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("company_stock", e))?;

        Ok(rows.into_iter().map(ProductStock::from).collect())
    }

    #[instrument(skip(self), fields(company_id = %company_id, product_id = %product_id), err)]
    async fn movements(
        &self,
        company_id: CompanyId,
        product_id: ProductId,
    ) -> Result<Vec<StockMovementRecord>, StoreError> {
        // movement_id is a UUIDv7, so id order is application order.
        let rows: Vec<StockMovementRow> = sqlx::query_as(
            r#"
            SELECT
                movement_id, company_id, product_id, movement_type,
                quantity, unit_cost, movement_value,
                resulting_quantity, resulting_average_cost,
                document_type, document_id, description,
                actor_id, occurred_at
            FROM stock_movements
            WHERE company_id = $1 AND product_id = $2
            ORDER BY movement_id ASC
            "#,
        )
        .bind(company_id.as_uuid())
        .bind(product_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("movements", e))?;

        rows.into_iter().map(StockMovementRecord::try_from).collect()
    }
}

#[derive(Debug)]
struct ProductStockRow {
    company_id: Uuid,
    product_id: Uuid,
    name: String,
    category: Option<String>,
    quantity: Decimal,
    average_cost: Decimal,
    cost_price: Decimal,
    reorder_level: Decimal,
    active: bool,
    updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for ProductStockRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductStockRow {
            company_id: row.try_get("company_id")?,
            product_id: row.try_get("product_id")?,
            name: row.try_get("name")?,
            category: row.try_get("category")?,
            quantity: row.try_get("quantity")?,
            average_cost: row.try_get("average_cost")?,
            cost_price: row.try_get("cost_price")?,
            reorder_level: row.try_get("reorder_level")?,
            active: row.try_get("active")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl From<ProductStockRow> for ProductStock {
    fn from(row: ProductStockRow) -> Self {
        Self {
            company_id: row.company_id.into(),
            product_id: row.product_id.into(),
            name: row.name,
            category: row.category,
            quantity: row.quantity,
            average_cost: row.average_cost,
            cost_price: row.cost_price,
            reorder_level: row.reorder_level,
            active: row.active,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug)]
struct StockMovementRow {
    movement_id: Uuid,
    company_id: Uuid,
    product_id: Uuid,
    movement_type: String,
    quantity: Decimal,
    unit_cost: Decimal,
    movement_value: Decimal,
    resulting_quantity: Decimal,
    resulting_average_cost: Decimal,
    document_type: Option<String>,
    document_id: Option<String>,
    description: Option<String>,
    actor_id: Option<Uuid>,
    occurred_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StockMovementRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StockMovementRow {
            movement_id: row.try_get("movement_id")?,
            company_id: row.try_get("company_id")?,
            product_id: row.try_get("product_id")?,
            movement_type: row.try_get("movement_type")?,
            quantity: row.try_get("quantity")?,
            unit_cost: row.try_get("unit_cost")?,
            movement_value: row.try_get("movement_value")?,
            resulting_quantity: row.try_get("resulting_quantity")?,
            resulting_average_cost: row.try_get("resulting_average_cost")?,
            document_type: row.try_get("document_type")?,
            document_id: row.try_get("document_id")?,
            description: row.try_get("description")?,
            actor_id: row.try_get("actor_id")?,
            occurred_at: row.try_get("occurred_at")?,
        })
    }
}

impl TryFrom<StockMovementRow> for StockMovementRecord {
    type Error = StoreError;

    fn try_from(row: StockMovementRow) -> Result<Self, Self::Error> {
        let movement_type = row
            .movement_type
            .parse()
            .map_err(|e| StoreError::storage(format!("corrupt movement row: {e}")))?;
        Ok(Self {
            movement_id: row.movement_id.into(),
            company_id: row.company_id.into(),
            product_id: row.product_id.into(),
            movement_type,
            quantity: row.quantity,
            unit_cost: row.unit_cost,
            movement_value: row.movement_value,
            resulting_quantity: row.resulting_quantity,
            resulting_average_cost: row.resulting_average_cost,
            reference: MovementReference {
                document_type: row.document_type,
                document_id: row.document_id,
                description: row.description,
            },
            actor: row.actor_id.map(Into::into),
            occurred_at: row.occurred_at,
        })
    }
}

fn map_sqlx_error(operation: &str, error: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &error {
        match db.code().as_deref() {
            Some("23505") => {
                return StoreError::Domain(DomainError::conflict(format!(
                    "{operation}: concurrent write detected"
                )));
            }
            Some("23514") => {
                return StoreError::Domain(DomainError::conflict(format!(
                    "{operation}: constraint violated: {}",
                    db.message()
                )));
            }
            _ => {}
        }
    }
    StoreError::Storage(format!("{operation}: {error}"))
}
