//! Product model (catalog boundary)
//!
//! The catalog itself is managed elsewhere; the fulfillment engine only
//! reads price/cost/active and owns `stock_quantity` through the stock
//! ledger.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Product {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub price: Decimal,
    pub cost: Decimal,
    pub stock_quantity: i32,
    pub low_stock_threshold: i32,
    pub is_active: bool,
}
