//! Webhook order normalizer
//!
//! Maps untrusted marketplace payloads into the coordinator's canonical
//! request shape. Items are addressed by SKU; a SKU with no catalog match
//! is kept as an unlinked item (persisted snapshot, no stock deduction)
//! rather than rejecting the whole order. Stated payload totals are used
//! verbatim, even when they no longer reconcile with the matched items —
//! observed marketplace behavior, deliberately preserved.
//!
//! Marketplace orders arrive pre-paid, so the canonical request starts at
//! `confirmed` / `paid`.

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::db::models::{CustomerProfile, OrderStatus, PaymentStatus};
use crate::error::AppError;
use crate::fulfillment::{CustomerRef, NewOrderItem, OrderRequest, StatedTotals};

/// External marketplace order payload
#[derive(Debug, Clone, Deserialize)]
pub struct ExternalOrderPayload {
    pub marketplace: String,
    pub external_order_id: String,
    pub customer: ExternalCustomer,
    pub items: Vec<ExternalItem>,
    pub totals: ExternalTotals,
    #[serde(default)]
    pub shipping: serde_json::Value,
    pub payment_method: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExternalCustomer {
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExternalItem {
    pub sku: String,
    #[serde(default)]
    pub name: String,
    pub quantity: i32,
    pub price: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExternalTotals {
    pub subtotal: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub shipping_fee: Decimal,
    #[serde(default)]
    pub tax: Decimal,
    pub total: Decimal,
}

/// Look up the payload's SKUs in the catalog.
pub async fn resolve_skus(
    pool: &PgPool,
    payload: &ExternalOrderPayload,
) -> Result<HashMap<String, Uuid>, AppError> {
    let skus: Vec<String> = payload.items.iter().map(|i| i.sku.clone()).collect();
    let rows: Vec<(String, Uuid)> = sqlx::query_as(
        "SELECT sku, id FROM products WHERE sku = ANY($1) AND is_active",
    )
    .bind(&skus)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().collect())
}

/// Build the canonical request from a payload and its resolved SKU map.
/// Pure; the handler performs the lookup and the coordinator call.
pub fn build_request(
    payload: &ExternalOrderPayload,
    sku_map: &HashMap<String, Uuid>,
) -> Result<OrderRequest, AppError> {
    if payload.items.is_empty() {
        return Err(AppError::validation("Webhook order has no items"));
    }

    let items = payload
        .items
        .iter()
        .map(|item| {
            let product_id = sku_map.get(&item.sku).copied();
            if product_id.is_none() {
                tracing::warn!(
                    marketplace = %payload.marketplace,
                    external_order_id = %payload.external_order_id,
                    sku = %item.sku,
                    "Unmatched SKU recorded as unlinked item"
                );
            }
            NewOrderItem {
                product_id,
                sku: item.sku.clone(),
                name: item.name.clone(),
                quantity: item.quantity,
                unit_price: Some(item.price),
            }
        })
        .collect();

    Ok(OrderRequest {
        customer: CustomerRef::Profile(CustomerProfile {
            email: payload.customer.email.clone(),
            name: payload.customer.name.clone(),
            phone: payload.customer.phone.clone(),
            address: String::new(),
        }),
        channel: payload.marketplace.clone(),
        staff_id: None,
        affiliate_id: None,
        items,
        shipping_address: payload.shipping.clone(),
        payment_method: payload.payment_method.clone(),
        discount: payload.totals.discount,
        shipping_fee: payload.totals.shipping_fee,
        tax: payload.totals.tax,
        stated_totals: Some(StatedTotals {
            subtotal: payload.totals.subtotal,
            discount: payload.totals.discount,
            shipping_fee: payload.totals.shipping_fee,
            tax: payload.totals.tax,
            total: payload.totals.total,
        }),
        initial_status: OrderStatus::Confirmed,
        initial_payment_status: PaymentStatus::Paid,
        actor: format!("webhook:{}", payload.marketplace),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> ExternalOrderPayload {
        serde_json::from_value(serde_json::json!({
            "marketplace": "lagoon",
            "external_order_id": "EXT-1001",
            "customer": { "email": "ana@example.com", "name": "Ana", "phone": "+34600000000" },
            "items": [
                { "sku": "SKU-A", "name": "Known product", "quantity": 2, "price": "10.00" },
                { "sku": "SKU-GHOST", "name": "Delisted product", "quantity": 1, "price": "5.00" }
            ],
            "totals": { "subtotal": "25.00", "discount": "0", "shipping_fee": "4.00", "tax": "2.00", "total": "31.00" },
            "shipping": { "line1": "Calle Mayor 1" },
            "payment_method": "marketplace_balance"
        }))
        .unwrap()
    }

    #[test]
    fn known_sku_links_unknown_stays_unlinked() {
        let product_a = Uuid::new_v4();
        let sku_map = HashMap::from([("SKU-A".to_string(), product_a)]);

        let request = build_request(&payload(), &sku_map).unwrap();
        assert_eq!(request.items.len(), 2);
        assert_eq!(request.items[0].product_id, Some(product_a));
        assert_eq!(request.items[1].product_id, None);
        // Unlinked items carry the stated price for their snapshot
        assert_eq!(request.items[1].unit_price, Some("5.00".parse().unwrap()));
    }

    #[test]
    fn stated_totals_used_verbatim() {
        let request = build_request(&payload(), &HashMap::new()).unwrap();
        let totals = request.stated_totals.expect("webhook requests carry stated totals");
        assert_eq!(totals.total, "31.00".parse().unwrap());
        assert_eq!(totals.shipping_fee, "4.00".parse().unwrap());
    }

    #[test]
    fn marketplace_orders_start_confirmed_and_paid() {
        let request = build_request(&payload(), &HashMap::new()).unwrap();
        assert_eq!(request.initial_status, OrderStatus::Confirmed);
        assert_eq!(request.initial_payment_status, PaymentStatus::Paid);
        assert_eq!(request.channel, "lagoon");
    }

    #[test]
    fn empty_item_list_rejected() {
        let mut p = payload();
        p.items.clear();
        assert!(build_request(&p, &HashMap::new()).is_err());
    }
}
