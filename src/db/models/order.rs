//! Order and order-item models
//!
//! Status and payment transitions are modeled as explicit state machines.
//! The order total is computed once at creation (`subtotal - discount +
//! shipping_fee + tax`) and never recomputed; cancellation and refund are
//! recorded transitions, not total mutations.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;

/// Order lifecycle status
///
/// `pending → confirmed → processing → packed → shipped → delivered`,
/// with `cancelled` / `refunded` reachable from any pre-delivered state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Packed,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::Packed => "packed",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    pub fn parse(s: &str) -> Result<Self, AppError> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "processing" => Ok(Self::Processing),
            "packed" => Ok(Self::Packed),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            "refunded" => Ok(Self::Refunded),
            other => Err(AppError::validation(format!("Unknown order status: {other}"))),
        }
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled | Self::Refunded)
    }

    /// Whether `next` is a valid edge from the current status.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            // Forward chain
            Self::Confirmed => *self == Self::Pending,
            Self::Processing => *self == Self::Confirmed,
            Self::Packed => *self == Self::Processing,
            Self::Shipped => *self == Self::Packed,
            Self::Delivered => *self == Self::Shipped,
            // Escape hatches from any pre-delivered state
            Self::Cancelled | Self::Refunded => true,
            Self::Pending => false,
        }
    }
}

/// Payment status
///
/// `pending → paid | failed`; `paid → refunded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }

    pub fn parse(s: &str) -> Result<Self, AppError> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            "refunded" => Ok(Self::Refunded),
            other => Err(AppError::validation(format!(
                "Unknown payment status: {other}"
            ))),
        }
    }

    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Paid)
                | (Self::Pending, Self::Failed)
                | (Self::Paid, Self::Refunded)
        )
    }
}

/// Order row
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub channel: String,
    pub staff_id: Option<Uuid>,
    pub affiliate_id: Option<Uuid>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping_fee: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub status: String,
    pub payment_status: String,
    pub payment_method: String,
    pub shipping_address: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Order item row — name/SKU/price are snapshots taken at creation time,
/// independent of later product edits. `product_id` is NULL for webhook
/// items whose SKU did not match the catalog.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Option<Uuid>,
    pub name: String,
    pub sku: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub unit_cost: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_chain_is_strict() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Confirmed));
        assert!(OrderStatus::Confirmed.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Packed));
        assert!(OrderStatus::Packed.can_transition_to(OrderStatus::Shipped));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Delivered));

        // No skipping steps
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Processing));
        assert!(!OrderStatus::Confirmed.can_transition_to(OrderStatus::Shipped));
        // No going backwards
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Packed));
    }

    #[test]
    fn cancel_and_refund_from_any_pre_delivered_state() {
        for s in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Packed,
            OrderStatus::Shipped,
        ] {
            assert!(s.can_transition_to(OrderStatus::Cancelled), "{s:?}");
            assert!(s.can_transition_to(OrderStatus::Refunded), "{s:?}");
        }
    }

    #[test]
    fn terminal_states_accept_nothing() {
        for s in [
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
            OrderStatus::Refunded,
        ] {
            for next in [
                OrderStatus::Pending,
                OrderStatus::Confirmed,
                OrderStatus::Cancelled,
                OrderStatus::Refunded,
            ] {
                assert!(!s.can_transition_to(next), "{s:?} -> {next:?}");
            }
        }
    }

    #[test]
    fn payment_edges() {
        assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Paid));
        assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Failed));
        assert!(PaymentStatus::Paid.can_transition_to(PaymentStatus::Refunded));

        assert!(!PaymentStatus::Paid.can_transition_to(PaymentStatus::Pending));
        assert!(!PaymentStatus::Failed.can_transition_to(PaymentStatus::Paid));
        assert!(!PaymentStatus::Refunded.can_transition_to(PaymentStatus::Paid));
    }

    #[test]
    fn status_roundtrip() {
        for s in [
            "pending",
            "confirmed",
            "processing",
            "packed",
            "shipped",
            "delivered",
            "cancelled",
            "refunded",
        ] {
            assert_eq!(OrderStatus::parse(s).unwrap().as_str(), s);
        }
        assert!(OrderStatus::parse("unknown").is_err());
    }
}
