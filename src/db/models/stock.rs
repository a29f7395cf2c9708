//! Stock movement model
//!
//! Append-only: current stock for a product equals its baseline plus the
//! sum of movement deltas.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    Sale,
    Restock,
    Adjustment,
    Reversal,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sale => "sale",
            Self::Restock => "restock",
            Self::Adjustment => "adjustment",
            Self::Reversal => "reversal",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StockMovement {
    pub id: Uuid,
    pub product_id: Uuid,
    pub delta: i32,
    pub movement_type: String,
    pub reference: String,
    pub actor: String,
    pub created_at: DateTime<Utc>,
}
