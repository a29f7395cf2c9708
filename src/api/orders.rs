//! Order API handlers

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{CurrentUser, policy};
use crate::db::models::{CustomerProfile, Order, OrderItem, OrderStatus, PaymentStatus};
use crate::error::{AppError, AppResult};
use crate::fulfillment::{CustomerRef, NewOrderItem, OrderRequest, PlacedOrder, coordinator};
use crate::state::AppState;

/// Customer profile supplied inline when no `customer_id` is given
#[derive(Debug, Deserialize, Validate)]
pub struct NewCustomer {
    #[validate(email)]
    pub email: String,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub phone: String,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub address: String,
}

// Serialize: the length validator embeds the offending value in its params
#[derive(Debug, serde::Serialize, Deserialize)]
pub struct NewItem {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// POST /api/orders request body
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    pub customer_id: Option<Uuid>,
    #[validate(nested)]
    pub customer: Option<NewCustomer>,
    #[validate(length(min = 1, max = 100))]
    pub channel: String,
    pub affiliate_id: Option<Uuid>,
    #[validate(length(min = 1))]
    pub items: Vec<NewItem>,
    #[serde(default)]
    pub shipping_address: Value,
    #[validate(length(min = 1, max = 100))]
    pub payment_method: String,
    pub discount: Option<Decimal>,
    pub shipping_fee: Option<Decimal>,
    pub tax: Option<Decimal>,
}

/// Create an order (internal path: catalog prices, `pending`/`pending`)
pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<(StatusCode, Json<PlacedOrder>)> {
    policy::require(&user.role, policy::Action::CreateOrder)?;
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let customer = match (payload.customer_id, payload.customer) {
        (Some(id), _) => CustomerRef::Existing(id),
        (None, Some(profile)) => CustomerRef::Profile(CustomerProfile {
            email: profile.email,
            name: profile.name,
            phone: profile.phone,
            address: profile.address,
        }),
        (None, None) => {
            return Err(AppError::validation(
                "Either customer_id or customer profile is required",
            ));
        }
    };

    let request = OrderRequest {
        customer,
        channel: payload.channel,
        staff_id: user.id,
        affiliate_id: payload.affiliate_id,
        items: payload
            .items
            .into_iter()
            .map(|i| NewOrderItem {
                product_id: Some(i.product_id),
                sku: String::new(),
                name: String::new(),
                quantity: i.quantity,
                unit_price: None,
            })
            .collect(),
        shipping_address: payload.shipping_address,
        payment_method: payload.payment_method,
        discount: payload.discount.unwrap_or(Decimal::ZERO),
        shipping_fee: payload.shipping_fee.unwrap_or(Decimal::ZERO),
        tax: payload.tax.unwrap_or(Decimal::ZERO),
        stated_totals: None,
        initial_status: OrderStatus::Pending,
        initial_payment_status: PaymentStatus::Pending,
        actor: user.name.clone(),
    };

    let placed = coordinator::create_order(&state, request).await?;
    Ok((StatusCode::CREATED, Json(placed)))
}

/// Order detail response
#[derive(Debug, serde::Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Get order with line items
pub async fn get_by_id(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<OrderDetail>> {
    policy::require(&user.role, policy::Action::ViewOrder)?;

    let order = coordinator::fetch_order(&state.pool, id).await?;
    let items = coordinator::fetch_order_items(&state.pool, id).await?;
    Ok(Json(OrderDetail { order, items }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

/// PATCH /api/orders/{id}/status (privileged)
pub async fn update_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> AppResult<StatusCode> {
    policy::require(&user.role, policy::Action::UpdateOrderStatus)?;

    coordinator::update_status(&state, id, payload.status, &user.name).await?;
    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
pub struct UpdatePaymentRequest {
    pub payment_status: PaymentStatus,
}

/// PATCH /api/orders/{id}/payment — `paid` approves the order's pending
/// commissions as a side effect.
pub async fn update_payment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePaymentRequest>,
) -> AppResult<StatusCode> {
    policy::require(&user.role, policy::Action::UpdatePayment)?;

    coordinator::update_payment(&state, id, payload.payment_status, user.id).await?;
    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(items: Vec<NewItem>) -> CreateOrderRequest {
        CreateOrderRequest {
            customer_id: Some(Uuid::new_v4()),
            customer: None,
            channel: "direct".into(),
            affiliate_id: None,
            items,
            shipping_address: serde_json::json!({}),
            payment_method: "card".into(),
            discount: None,
            shipping_fee: None,
            tax: None,
        }
    }

    #[test]
    fn empty_item_list_fails_validation() {
        assert!(request(vec![]).validate().is_err());
    }

    #[test]
    fn single_item_passes_validation() {
        let req = request(vec![NewItem {
            product_id: Uuid::new_v4(),
            quantity: 1,
        }]);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn bad_email_rejected() {
        let mut req = request(vec![NewItem {
            product_id: Uuid::new_v4(),
            quantity: 1,
        }]);
        req.customer_id = None;
        req.customer = Some(NewCustomer {
            email: "not-an-email".into(),
            name: String::new(),
            phone: String::new(),
            address: String::new(),
        });
        assert!(req.validate().is_err());
    }
}
