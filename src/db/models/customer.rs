//! Customer model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Customer row. `total_orders` / `total_spent` are maintained only by the
/// order coordinator, inside the order-creation transaction.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Customer {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: String,
    pub address: String,
    pub total_orders: i32,
    pub total_spent: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Profile supplied when resolving a customer by email. Only used to create
/// a new row; existing stored fields always win.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
}
