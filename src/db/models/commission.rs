//! Commission config and record models
//!
//! Record workflow: `pending → approved → paid`, with `pending | approved →
//! cancelled`. No other edge exists.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;

/// Commission type: percentage of the order total, or a fixed amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionType {
    Percentage,
    Fixed,
}

impl CommissionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Percentage => "percentage",
            Self::Fixed => "fixed",
        }
    }

    pub fn parse(s: &str) -> Result<Self, AppError> {
        match s {
            "percentage" => Ok(Self::Percentage),
            "fixed" => Ok(Self::Fixed),
            other => Err(AppError::validation(format!(
                "Unknown commission type: {other}"
            ))),
        }
    }
}

/// Commission record status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus {
    Pending,
    Approved,
    Cancelled,
    Paid,
}

impl CommissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Cancelled => "cancelled",
            Self::Paid => "paid",
        }
    }

    pub fn parse(s: &str) -> Result<Self, AppError> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "cancelled" => Ok(Self::Cancelled),
            "paid" => Ok(Self::Paid),
            other => Err(AppError::validation(format!(
                "Unknown commission status: {other}"
            ))),
        }
    }

    pub fn can_transition_to(&self, next: CommissionStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved)
                | (Self::Approved, Self::Paid)
                | (Self::Pending, Self::Cancelled)
                | (Self::Approved, Self::Cancelled)
        )
    }
}

/// Role the commission actor played in the order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionRole {
    Staff,
    Affiliate,
}

impl CommissionRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Staff => "staff",
            Self::Affiliate => "affiliate",
        }
    }
}

/// Active commission configuration row for an actor.
/// Temporal validity window is `[effective_from, effective_until)`; the
/// data layer guarantees at most one active config per actor per instant.
#[derive(Debug, Clone, FromRow)]
pub struct CommissionConfig {
    pub id: Uuid,
    pub actor_id: Uuid,
    pub commission_type: String,
    pub value: Decimal,
    pub effective_from: DateTime<Utc>,
    pub effective_until: DateTime<Utc>,
    pub is_active: bool,
}

/// One computed payout entry tied to an order and an acting staff/affiliate
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CommissionRecord {
    pub id: Uuid,
    pub actor_id: Uuid,
    pub order_id: Uuid,
    pub actor_role: String,
    pub amount: Decimal,
    pub rate: Decimal,
    pub order_total: Decimal,
    pub status: String,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub paid_by: Option<Uuid>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_four_edges_exist() {
        use CommissionStatus::*;
        let all = [Pending, Approved, Cancelled, Paid];
        let valid = [
            (Pending, Approved),
            (Approved, Paid),
            (Pending, Cancelled),
            (Approved, Cancelled),
        ];
        for from in all {
            for to in all {
                let expected = valid.contains(&(from, to));
                assert_eq!(from.can_transition_to(to), expected, "{from:?} -> {to:?}");
            }
        }
    }

    #[test]
    fn paid_is_terminal() {
        use CommissionStatus::*;
        for to in [Pending, Approved, Cancelled, Paid] {
            assert!(!Paid.can_transition_to(to));
        }
    }
}
