//! Webhook handlers
//!
//! Both endpoints receive the raw body so the HMAC signature can be
//! verified before anything is parsed or processed.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::{Json, response::IntoResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit;
use crate::db::models::PaymentStatus;
use crate::error::AppError;
use crate::fulfillment::coordinator;
use crate::state::AppState;
use crate::webhook::normalizer::{self, ExternalOrderPayload};
use crate::webhook::signature::{SIGNATURE_HEADER, verify_signature};

/// Marketplace-facing response shape
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl WebhookResponse {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            order_id: None,
            order_number: None,
            message: Some(message.into()),
        }
    }
}

/// A body that failed JSONB decoding, preserved as a string value for the
/// audit sink. Lossy: invalid UTF-8 bytes become replacement characters.
fn raw_body_fallback(body: &[u8]) -> serde_json::Value {
    serde_json::Value::String(String::from_utf8_lossy(body).into_owned())
}

fn check_signature(state: &AppState, headers: &HeaderMap, body: &[u8]) -> Result<(), StatusCode> {
    let Some(sig) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        tracing::warn!("Missing {SIGNATURE_HEADER} header");
        return Err(StatusCode::UNAUTHORIZED);
    };
    if let Err(e) = verify_signature(body, sig, &state.webhook_secret) {
        tracing::warn!(error = e, "Webhook signature verification failed");
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(())
}

/// POST /webhooks/order/external
///
/// The raw payload is persisted to the audit sink before processing, so a
/// failed creation remains diagnosable. Unmatched SKUs become unlinked
/// items; the order is created `confirmed`/`paid`.
pub async fn external_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    // 1. Signature first: unsigned input is dropped before any side effect.
    if let Err(status) = check_signature(&state, &headers, &body) {
        return (status, Json(WebhookResponse::failure("Invalid signature")));
    }

    // 2. Parse. Undecodable bodies still reach the audit sink (wrapped as
    //    a JSON string) so the rejected delivery stays diagnosable.
    let raw: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "Webhook payload is not valid JSON");
            match audit::record_webhook(&state.pool, "unknown", "", &raw_body_fallback(&body)).await
            {
                Ok(log_id) => {
                    audit::mark_webhook_outcome(&state.pool, log_id, false, None, "invalid JSON")
                        .await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to persist undecodable webhook payload");
                }
            }
            return (
                StatusCode::BAD_REQUEST,
                Json(WebhookResponse::failure("Invalid JSON payload")),
            );
        }
    };

    let marketplace = raw["marketplace"].as_str().unwrap_or("unknown").to_string();
    let external_order_id = raw["external_order_id"].as_str().unwrap_or("").to_string();

    // 3. Audit sink, unconditionally, before processing. If the raw
    //    payload cannot be persisted the delivery is rejected outright.
    let log_id = match audit::record_webhook(&state.pool, &marketplace, &external_order_id, &raw)
        .await
    {
        Ok(id) => id,
        Err(e) => {
            tracing::error!(error = %e, "Failed to persist webhook payload");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(WebhookResponse::failure("Audit log unavailable")),
            );
        }
    };

    // 4. Normalize and delegate to the coordinator.
    let result = process_order(&state, &raw).await;

    match result {
        Ok(placed) => {
            audit::mark_webhook_outcome(&state.pool, log_id, true, Some(placed.order_id), "created")
                .await;
            (
                StatusCode::CREATED,
                Json(WebhookResponse {
                    success: true,
                    order_id: Some(placed.order_id),
                    order_number: Some(placed.order_number),
                    message: None,
                }),
            )
        }
        Err(e) => {
            audit::mark_webhook_outcome(&state.pool, log_id, false, None, &e.to_string()).await;
            let status = match &e {
                AppError::Validation(_) | AppError::InsufficientStock { .. } => {
                    StatusCode::BAD_REQUEST
                }
                AppError::NotFound(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            // External callers get the business message, never internals.
            let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
                "Order processing failed".to_string()
            } else {
                e.to_string()
            };
            (status, Json(WebhookResponse::failure(message)))
        }
    }
}

async fn process_order(
    state: &AppState,
    raw: &serde_json::Value,
) -> Result<coordinator::PlacedOrder, AppError> {
    let payload: ExternalOrderPayload = serde_json::from_value(raw.clone())
        .map_err(|e| AppError::validation(format!("Malformed webhook payload: {e}")))?;

    let sku_map = normalizer::resolve_skus(&state.pool, &payload).await?;
    let request = normalizer::build_request(&payload, &sku_map)?;
    coordinator::create_order(state, request).await
}

/// POST /webhooks/payment/confirmation body
#[derive(Debug, Deserialize)]
pub struct PaymentConfirmation {
    pub order_number: String,
    pub status: String,
    #[serde(default)]
    pub transaction_id: String,
}

/// POST /webhooks/payment/confirmation
///
/// `status=success` drives the same commission-approval side effect as the
/// internal payment endpoint. Retries of an already-confirmed payment are
/// acknowledged without error.
pub async fn payment_confirmation(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if let Err(status) = check_signature(&state, &headers, &body) {
        return (status, Json(WebhookResponse::failure("Invalid signature")));
    }

    let payload: PaymentConfirmation = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(WebhookResponse::failure(format!("Malformed payload: {e}"))),
            );
        }
    };

    let target = match payload.status.as_str() {
        "success" => PaymentStatus::Paid,
        "failed" => PaymentStatus::Failed,
        other => {
            return (
                StatusCode::BAD_REQUEST,
                Json(WebhookResponse::failure(format!(
                    "Unknown payment status: {other}"
                ))),
            );
        }
    };

    let order = match coordinator::fetch_order_by_number(&state.pool, &payload.order_number).await {
        Ok(o) => o,
        Err(AppError::NotFound(msg)) => {
            return (StatusCode::NOT_FOUND, Json(WebhookResponse::failure(msg)));
        }
        Err(e) => {
            tracing::error!(error = %e, "Payment confirmation lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(WebhookResponse::failure("Lookup failed")),
            );
        }
    };

    // Gateway retry of a delivery we already applied
    if order.payment_status == target.as_str() {
        return (
            StatusCode::OK,
            Json(WebhookResponse {
                success: true,
                order_id: Some(order.id),
                order_number: Some(order.order_number),
                message: Some("Already applied".into()),
            }),
        );
    }

    tracing::info!(
        order_number = %payload.order_number,
        transaction_id = %payload.transaction_id,
        status = %payload.status,
        "Payment confirmation received"
    );

    match coordinator::update_payment(&state, order.id, target, None).await {
        Ok(()) => (
            StatusCode::OK,
            Json(WebhookResponse {
                success: true,
                order_id: Some(order.id),
                order_number: Some(order.order_number),
                message: None,
            }),
        ),
        Err(AppError::InvalidTransition(msg)) => (
            StatusCode::CONFLICT,
            Json(WebhookResponse::failure(msg)),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Payment confirmation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(WebhookResponse::failure("Payment update failed")),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undecodable_body_becomes_string_payload() {
        let v = raw_body_fallback(b"not json {{");
        assert_eq!(v, serde_json::Value::String("not json {{".into()));
    }

    #[test]
    fn invalid_utf8_is_preserved_lossily() {
        let v = raw_body_fallback(&[0x7b, 0xff, 0xfe]);
        let serde_json::Value::String(s) = v else {
            panic!("expected a string payload");
        };
        assert!(s.starts_with('{'));
        assert!(s.contains('\u{fffd}'));
    }
}
