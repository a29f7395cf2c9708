//! Order transaction coordinator
//!
//! Executes one atomic unit of work per order: order row, line items,
//! stock deductions, customer resolution + aggregates, and commission
//! records all commit or roll back together. Notifications are dispatched
//! only after commit and are outside the atomic guarantee.
//!
//! Status transitions live here too: cancellation restores stock and
//! cancels commissions in its own transaction, and a payment moving to
//! `paid` approves the order's pending commissions as part of the same
//! request.

use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::{
    CommissionRole, CustomerProfile, Order, OrderItem, OrderStatus, PaymentStatus,
};
use crate::error::AppError;
use crate::fulfillment::{commission, customer, stock};
use crate::notify::{NotifyEvent, spawn_notify};
use crate::state::AppState;
use crate::util::{MAX_SHORT_TEXT_LEN, validate_required_text};

/// Reference to the buying customer: an existing row, or a profile to
/// resolve by email.
#[derive(Debug, Clone)]
pub enum CustomerRef {
    Existing(Uuid),
    Profile(CustomerProfile),
}

/// One requested line item.
///
/// `product_id` is `None` for webhook items whose SKU did not match the
/// catalog; those are persisted as unlinked snapshots and skip the stock
/// ledger. `unit_price` overrides the catalog price when given (webhook
/// payloads state their own prices) and is required for unlinked items.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: Option<Uuid>,
    pub sku: String,
    pub name: String,
    pub quantity: i32,
    pub unit_price: Option<Decimal>,
}

/// Totals stated by an external payload, used verbatim instead of the
/// computed ones (observed marketplace behavior, kept as-is).
#[derive(Debug, Clone)]
pub struct StatedTotals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping_fee: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

/// Canonical order-creation request, shared by the internal API path and
/// the webhook normalizer.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub customer: CustomerRef,
    pub channel: String,
    pub staff_id: Option<Uuid>,
    pub affiliate_id: Option<Uuid>,
    pub items: Vec<NewOrderItem>,
    pub shipping_address: Value,
    pub payment_method: String,
    pub discount: Decimal,
    pub shipping_fee: Decimal,
    pub tax: Decimal,
    pub stated_totals: Option<StatedTotals>,
    pub initial_status: OrderStatus,
    pub initial_payment_status: PaymentStatus,
    /// Actor recorded on stock movements
    pub actor: String,
}

/// Result of a committed order
#[derive(Debug, Clone, serde::Serialize)]
pub struct PlacedOrder {
    pub order_id: Uuid,
    pub order_number: String,
    pub total: Decimal,
}

/// `total = subtotal - discount + shipping_fee + tax`, fixed at creation.
pub fn compute_total(
    subtotal: Decimal,
    discount: Decimal,
    shipping_fee: Decimal,
    tax: Decimal,
) -> Decimal {
    (subtotal - discount + shipping_fee + tax).round_dp(2)
}

/// Human-readable unique order number: `RF-YYYYMMDD-XXXXXX`.
/// The unique column constraint is the backstop against collisions.
pub fn generate_order_number() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect();
    format!("RF-{}-{}", Utc::now().format("%Y%m%d"), suffix)
}

fn validate_request(request: &OrderRequest) -> Result<(), AppError> {
    if request.items.is_empty() {
        return Err(AppError::validation("Order must contain at least one item"));
    }
    for item in &request.items {
        if item.quantity <= 0 {
            return Err(AppError::validation("Item quantity must be positive"));
        }
        if item.product_id.is_none() && item.unit_price.is_none() {
            return Err(AppError::validation(
                "Unlinked items must state a unit price",
            ));
        }
    }
    validate_required_text(&request.channel, "channel", MAX_SHORT_TEXT_LEN)?;
    validate_required_text(&request.payment_method, "payment method", MAX_SHORT_TEXT_LEN)?;
    for (field, value) in [
        ("discount", request.discount),
        ("shipping fee", request.shipping_fee),
        ("tax", request.tax),
    ] {
        if value < Decimal::ZERO {
            return Err(AppError::validation(format!("{field} must not be negative")));
        }
    }
    Ok(())
}

/// Catalog snapshot captured during the advisory pre-check
struct ProductSnapshot {
    sku: String,
    name: String,
    price: Decimal,
}

/// Create an order through the full atomic unit of work.
pub async fn create_order(state: &AppState, request: OrderRequest) -> Result<PlacedOrder, AppError> {
    validate_request(&request)?;

    // 1. Advisory pre-check: products must exist and be active, and the
    //    point-in-time stock must cover the request. The authoritative
    //    check happens again under the row lock inside the transaction.
    let mut snapshots: Vec<Option<ProductSnapshot>> = Vec::with_capacity(request.items.len());
    for item in &request.items {
        let Some(product_id) = item.product_id else {
            snapshots.push(None);
            continue;
        };
        let row: Option<(String, String, Decimal, i32, bool)> = sqlx::query_as(
            "SELECT sku, name, price, stock_quantity, is_active FROM products WHERE id = $1",
        )
        .bind(product_id)
        .fetch_optional(&state.pool)
        .await?;

        let Some((sku, name, price, stock_quantity, is_active)) = row else {
            return Err(AppError::not_found(format!("Product {product_id} not found")));
        };
        if !is_active {
            return Err(AppError::validation(format!("Product {sku} is not active")));
        }
        if item.quantity > stock_quantity {
            return Err(AppError::InsufficientStock {
                product_id,
                requested: item.quantity,
                available: stock_quantity,
            });
        }
        snapshots.push(Some(ProductSnapshot { sku, name, price }));
    }

    // 2. Totals. Stated totals from a marketplace payload win verbatim.
    let subtotal: Decimal = request
        .items
        .iter()
        .zip(&snapshots)
        .map(|(item, snap)| {
            let unit_price = item
                .unit_price
                .or_else(|| snap.as_ref().map(|s| s.price))
                .unwrap_or(Decimal::ZERO);
            unit_price * Decimal::from(item.quantity)
        })
        .sum::<Decimal>()
        .round_dp(2);

    let (subtotal, discount, shipping_fee, tax, total) = match &request.stated_totals {
        Some(t) => (t.subtotal, t.discount, t.shipping_fee, t.tax, t.total),
        None => (
            subtotal,
            request.discount,
            request.shipping_fee,
            request.tax,
            compute_total(subtotal, request.discount, request.shipping_fee, request.tax),
        ),
    };

    // 3. One atomic unit of work.
    let mut tx = state.pool.begin().await?;

    // Bounded lock wait so a stalled transaction cannot queue requests
    // behind it forever. SET LOCAL is scoped to this transaction.
    sqlx::query(&format!("SET LOCAL lock_timeout = '{}ms'", state.lock_timeout_ms))
        .execute(&mut *tx)
        .await?;

    // 4. Resolve the customer.
    let customer_id = match &request.customer {
        CustomerRef::Existing(id) => {
            customer::ensure_exists(&mut tx, *id).await?;
            *id
        }
        CustomerRef::Profile(profile) => customer::resolve(&mut tx, profile).await?,
    };

    // 5. Order row.
    let order_number = generate_order_number();
    let (order_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO orders
            (order_number, customer_id, channel, staff_id, affiliate_id,
             subtotal, discount, shipping_fee, tax, total,
             status, payment_status, payment_method, shipping_address)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        RETURNING id
        "#,
    )
    .bind(&order_number)
    .bind(customer_id)
    .bind(&request.channel)
    .bind(request.staff_id)
    .bind(request.affiliate_id)
    .bind(subtotal)
    .bind(discount)
    .bind(shipping_fee)
    .bind(tax)
    .bind(total)
    .bind(request.initial_status.as_str())
    .bind(request.initial_payment_status.as_str())
    .bind(&request.payment_method)
    .bind(&request.shipping_address)
    .fetch_one(&mut *tx)
    .await?;

    // 6. Items + stock deductions. Linked items are processed in product-id
    //    order so every order locks a shared product set in the same
    //    sequence (deadlock avoidance); unlinked items take no locks.
    let mut indexed: Vec<usize> = (0..request.items.len()).collect();
    indexed.sort_by_key(|&i| request.items[i].product_id);

    let mut low_stock: Vec<NotifyEvent> = Vec::new();
    for i in indexed {
        let item = &request.items[i];
        let snap = &snapshots[i];

        let (sku, name, unit_price, unit_cost) = match (item.product_id, snap) {
            (Some(product_id), Some(snap)) => {
                let deduction = stock::deduct(
                    &mut tx,
                    product_id,
                    item.quantity,
                    &order_number,
                    &request.actor,
                )
                .await?;
                if deduction.remaining <= deduction.low_stock_threshold {
                    low_stock.push(NotifyEvent::LowStock {
                        product_id,
                        remaining: deduction.remaining,
                        threshold: deduction.low_stock_threshold,
                    });
                }
                (
                    snap.sku.clone(),
                    snap.name.clone(),
                    item.unit_price.unwrap_or(snap.price),
                    deduction.unit_cost,
                )
            }
            _ => (
                item.sku.clone(),
                item.name.clone(),
                item.unit_price.unwrap_or(Decimal::ZERO),
                Decimal::ZERO,
            ),
        };

        sqlx::query(
            r#"
            INSERT INTO order_items
                (order_id, product_id, name, sku, quantity, unit_price, unit_cost)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(order_id)
        .bind(item.product_id)
        .bind(&name)
        .bind(&sku)
        .bind(item.quantity)
        .bind(unit_price)
        .bind(unit_cost)
        .execute(&mut *tx)
        .await?;
    }

    // 7. Customer aggregates — exactly once, inside this transaction.
    customer::record_order(&mut tx, customer_id, total).await?;

    // 8. Commissions for the acting staff member and the affiliate.
    if let Some(staff_id) = request.staff_id {
        commission::calculate(&mut tx, staff_id, CommissionRole::Staff, order_id, total).await?;
    }
    if let Some(affiliate_id) = request.affiliate_id {
        commission::calculate(&mut tx, affiliate_id, CommissionRole::Affiliate, order_id, total)
            .await?;
    }
    // Pre-paid orders (marketplace path) carry their approval with them.
    if request.initial_payment_status == PaymentStatus::Paid {
        commission::approve_for_order(&mut tx, order_id, None).await?;
    }

    // 9. Commit, then notify. Notification failures never affect the order.
    tx.commit().await?;

    tracing::info!(
        order_id = %order_id,
        order_number = %order_number,
        %total,
        "Order committed"
    );

    spawn_notify(
        state.notifier.clone(),
        NotifyEvent::OrderCreated {
            order_id,
            order_number: order_number.clone(),
            total,
        },
    );
    for event in low_stock {
        spawn_notify(state.notifier.clone(), event);
    }

    Ok(PlacedOrder {
        order_id,
        order_number,
        total,
    })
}

/// Fetch an order row by id.
pub async fn fetch_order(pool: &PgPool, order_id: Uuid) -> Result<Order, AppError> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
        .bind(order_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Order {order_id} not found")))
}

/// Fetch an order row by its human-readable number (payment webhook path).
pub async fn fetch_order_by_number(pool: &PgPool, order_number: &str) -> Result<Order, AppError> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE order_number = $1")
        .bind(order_number)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Order {order_number} not found")))
}

/// Fetch the line items of an order.
pub async fn fetch_order_items(pool: &PgPool, order_id: Uuid) -> Result<Vec<OrderItem>, AppError> {
    Ok(
        sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE order_id = $1")
            .bind(order_id)
            .fetch_all(pool)
            .await?,
    )
}

/// Advance the order status machine.
///
/// Entering `cancelled` restores stock for every linked item and cancels
/// the order's commission records, all in one transaction.
pub async fn update_status(
    state: &AppState,
    order_id: Uuid,
    new_status: OrderStatus,
    actor: &str,
) -> Result<(), AppError> {
    let order = fetch_order(&state.pool, order_id).await?;
    let current = OrderStatus::parse(&order.status)?;

    if !current.can_transition_to(new_status) {
        return Err(AppError::invalid_transition(format!(
            "Order {}: {} -> {}",
            order.order_number,
            current.as_str(),
            new_status.as_str()
        )));
    }

    let mut tx = state.pool.begin().await?;
    sqlx::query(&format!("SET LOCAL lock_timeout = '{}ms'", state.lock_timeout_ms))
        .execute(&mut *tx)
        .await?;

    // Guarded by the status observed in the pre-check: a concurrent
    // transition makes this match zero rows instead of applying twice.
    let result = sqlx::query(
        "UPDATE orders SET status = $2, updated_at = now() WHERE id = $1 AND status = $3",
    )
    .bind(order_id)
    .bind(new_status.as_str())
    .bind(current.as_str())
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::invalid_transition(format!(
            "Order {}: status changed concurrently, {} -> {} no longer applies",
            order.order_number,
            current.as_str(),
            new_status.as_str()
        )));
    }

    if new_status == OrderStatus::Cancelled {
        // Restore in canonical product order, mirroring the deduct path.
        let mut items: Vec<(Uuid, i32)> = sqlx::query_as(
            "SELECT product_id, quantity FROM order_items
             WHERE order_id = $1 AND product_id IS NOT NULL",
        )
        .bind(order_id)
        .fetch_all(&mut *tx)
        .await?;
        items.sort_by_key(|(product_id, _)| *product_id);

        for (product_id, quantity) in items {
            stock::restore(&mut tx, product_id, quantity, &order.order_number, actor).await?;
        }
        commission::cancel_for_order(&mut tx, order_id).await?;
    }

    tx.commit().await?;

    tracing::info!(
        order_id = %order_id,
        status = new_status.as_str(),
        "Order status updated"
    );

    spawn_notify(
        state.notifier.clone(),
        NotifyEvent::OrderStatusChanged {
            order_id,
            order_number: order.order_number,
            status: new_status.as_str().to_string(),
        },
    );

    Ok(())
}

/// Advance the payment status machine.
///
/// Entering `paid` approves every pending commission record of the order
/// in the same transaction; the order status itself is unaffected.
pub async fn update_payment(
    state: &AppState,
    order_id: Uuid,
    new_payment_status: PaymentStatus,
    approver: Option<Uuid>,
) -> Result<(), AppError> {
    let order = fetch_order(&state.pool, order_id).await?;
    let current = PaymentStatus::parse(&order.payment_status)?;

    if !current.can_transition_to(new_payment_status) {
        return Err(AppError::invalid_transition(format!(
            "Order {} payment: {} -> {}",
            order.order_number,
            current.as_str(),
            new_payment_status.as_str()
        )));
    }

    let mut tx = state.pool.begin().await?;
    sqlx::query(&format!("SET LOCAL lock_timeout = '{}ms'", state.lock_timeout_ms))
        .execute(&mut *tx)
        .await?;

    // Same concurrency guard as the status machine.
    let result = sqlx::query(
        "UPDATE orders SET payment_status = $2, updated_at = now()
         WHERE id = $1 AND payment_status = $3",
    )
    .bind(order_id)
    .bind(new_payment_status.as_str())
    .bind(current.as_str())
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::invalid_transition(format!(
            "Order {}: payment status changed concurrently, {} -> {} no longer applies",
            order.order_number,
            current.as_str(),
            new_payment_status.as_str()
        )));
    }

    if new_payment_status == PaymentStatus::Paid {
        let approved = commission::approve_for_order(&mut tx, order_id, approver).await?;
        tracing::info!(
            order_id = %order_id,
            approved,
            "Commissions approved on payment"
        );
    }

    tx.commit().await?;

    spawn_notify(
        state.notifier.clone(),
        NotifyEvent::PaymentStatusChanged {
            order_id,
            order_number: order.order_number,
            payment_status: new_payment_status.as_str().to_string(),
        },
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn total_formula() {
        // total = subtotal - discount + shipping + tax
        assert_eq!(
            compute_total(d("100.00"), d("10.00"), d("5.00"), d("8.00")),
            d("103.00")
        );
        assert_eq!(compute_total(d("0"), d("0"), d("0"), d("0")), d("0"));
    }

    #[test]
    fn order_number_shape() {
        let n = generate_order_number();
        let parts: Vec<&str> = n.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "RF");
        assert_eq!(parts[1].len(), 8);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 6);
        assert!(parts[2].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn order_numbers_vary() {
        let a = generate_order_number();
        let b = generate_order_number();
        // 32^6 combinations; two consecutive draws colliding would point
        // at a broken RNG rather than bad luck.
        assert_ne!(a, b);
    }

    fn item(product_id: Option<Uuid>, quantity: i32, unit_price: Option<&str>) -> NewOrderItem {
        NewOrderItem {
            product_id,
            sku: "SKU-1".into(),
            name: "Widget".into(),
            quantity,
            unit_price: unit_price.map(d),
        }
    }

    fn base_request(items: Vec<NewOrderItem>) -> OrderRequest {
        OrderRequest {
            customer: CustomerRef::Existing(Uuid::new_v4()),
            channel: "direct".into(),
            staff_id: None,
            affiliate_id: None,
            items,
            shipping_address: serde_json::json!({}),
            payment_method: "card".into(),
            discount: Decimal::ZERO,
            shipping_fee: Decimal::ZERO,
            tax: Decimal::ZERO,
            stated_totals: None,
            initial_status: OrderStatus::Pending,
            initial_payment_status: PaymentStatus::Pending,
            actor: "test".into(),
        }
    }

    #[test]
    fn empty_orders_rejected() {
        let err = validate_request(&base_request(vec![])).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn non_positive_quantity_rejected() {
        let req = base_request(vec![item(Some(Uuid::new_v4()), 0, None)]);
        assert!(validate_request(&req).is_err());
    }

    #[test]
    fn unlinked_item_requires_stated_price() {
        let req = base_request(vec![item(None, 1, None)]);
        assert!(validate_request(&req).is_err());

        let req = base_request(vec![item(None, 1, Some("9.99"))]);
        assert!(validate_request(&req).is_ok());
    }

    #[test]
    fn negative_money_rejected() {
        let mut req = base_request(vec![item(Some(Uuid::new_v4()), 1, None)]);
        req.discount = d("-1");
        assert!(validate_request(&req).is_err());
    }
}
