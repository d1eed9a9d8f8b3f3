//! Read-only valuation reporting over current product snapshots.
//!
//! Aggregates the denormalized snapshots, not the movement ledger: the
//! snapshot already is "apply all movements in order", kept current by the
//! stock store.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use yaadbooks_core::rounding::{round_money, round_quantity};
use yaadbooks_core::CompanyId;

use crate::stock_store::{ProductStock, StockStore, StoreError};

/// Category bucket for products without one.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Point-in-time inventory valuation for one company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuationSummary {
    pub company_id: CompanyId,
    /// Number of active, in-stock products counted.
    pub item_count: usize,
    /// Summed on-hand quantity (4 dp).
    pub total_quantity: Decimal,
    /// Summed on-hand value (2 dp).
    pub total_value: Decimal,
    /// Per-category breakdown, sorted descending by value.
    pub categories: Vec<CategoryValuation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryValuation {
    pub category: String,
    pub item_count: usize,
    pub quantity: Decimal,
    pub value: Decimal,
}

/// Read-only valuation reporter.
///
/// Pure aggregation; calling it twice without intervening movements returns
/// identical totals.
#[derive(Debug, Clone)]
pub struct ValuationReporter<S> {
    store: S,
}

impl<S: StockStore> ValuationReporter<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Valuation across all active, in-stock products of the company.
    ///
    /// Per-product value uses the weighted average cost when the product has
    /// one, falling back to the last purchase cost otherwise. Totals are
    /// rounded once, after summing exact per-product products.
    pub async fn summarize(&self, company_id: CompanyId) -> Result<ValuationSummary, StoreError> {
        let stocks = self.store.company_stock(company_id).await?;

        let mut item_count = 0usize;
        let mut total_quantity = Decimal::ZERO;
        let mut total_value = Decimal::ZERO;
        // Category name -> (count, quantity, value), exact until the end.
        let mut by_category: Vec<(String, usize, Decimal, Decimal)> = Vec::new();

        for stock in stocks.iter().filter(|s| s.active && s.quantity > Decimal::ZERO) {
            let value = stock.quantity * stock.valuation_unit_cost();
            item_count += 1;
            total_quantity += stock.quantity;
            total_value += value;

            let category = stock.category.as_deref().unwrap_or(UNCATEGORIZED);
            match by_category.iter_mut().find(|(name, ..)| name == category) {
                Some((_, count, quantity, bucket_value)) => {
                    *count += 1;
                    *quantity += stock.quantity;
                    *bucket_value += value;
                }
                None => by_category.push((category.to_string(), 1, stock.quantity, value)),
            }
        }

        let mut categories: Vec<CategoryValuation> = by_category
            .into_iter()
            .map(|(category, item_count, quantity, value)| CategoryValuation {
                category,
                item_count,
                quantity: round_quantity(quantity),
                value: round_money(value),
            })
            .collect();
        // Descending by value; name ascending keeps ties deterministic.
        categories.sort_by(|a, b| b.value.cmp(&a.value).then(a.category.cmp(&b.category)));

        Ok(ValuationSummary {
            company_id,
            item_count,
            total_quantity: round_quantity(total_quantity),
            total_value: round_money(total_value),
            categories,
        })
    }

    /// Active products at or below their reorder level.
    pub async fn low_stock(&self, company_id: CompanyId) -> Result<Vec<ProductStock>, StoreError> {
        let stocks = self.store.company_stock(company_id).await?;
        Ok(stocks
            .into_iter()
            .filter(|s| s.active && s.quantity <= s.reorder_level)
            .collect())
    }
}
