//! API routes
//!
//! # Structure
//!
//! - [`health`] - health check
//! - [`orders`] - order creation and status/payment transitions
//! - [`commissions`] - commission approval workflow
//! - [`stock`] - manual stock corrections and the movement ledger
//! - [`webhooks`] - marketplace order ingestion and payment confirmation

pub mod commissions;
pub mod health;
pub mod orders;
pub mod stock;
pub mod webhooks;

use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Create the combined router
pub fn create_router(state: AppState) -> Router {
    // Staff API (authenticated upstream; identity arrives as headers)
    let api = Router::new()
        .route("/api/orders", post(orders::create))
        .route("/api/orders/{id}", get(orders::get_by_id))
        .route("/api/orders/{id}/status", patch(orders::update_status))
        .route("/api/orders/{id}/payment", patch(orders::update_payment))
        .route("/api/commissions/{id}/approve", patch(commissions::approve))
        .route("/api/commissions/{id}/paid", patch(commissions::mark_paid))
        .route(
            "/api/commissions/order/{order_id}",
            get(commissions::list_for_order),
        )
        .route("/api/products/{id}/stock/adjust", post(stock::adjust))
        .route("/api/products/{id}/stock/movements", get(stock::movements));

    // Marketplace webhooks (signature-verified, raw body)
    let hooks = Router::new()
        .route("/webhooks/order/external", post(webhooks::external_order))
        .route(
            "/webhooks/payment/confirmation",
            post(webhooks::payment_confirmation),
        );

    Router::new()
        .route("/health", get(health::health_check))
        .merge(api)
        .merge(hooks)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
