//! Webhook audit sink
//!
//! Every external delivery is persisted raw before any processing, so a
//! failed order creation stays diagnosable from the stored payload. The
//! outcome update afterwards is best-effort and never fails the request.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;

/// Persist the raw payload. Called before normalization; a failure here
/// fails the whole delivery (we refuse to process what we cannot audit).
pub async fn record_webhook(
    pool: &PgPool,
    marketplace: &str,
    external_order_id: &str,
    payload: &serde_json::Value,
) -> Result<Uuid, AppError> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO webhook_logs (marketplace, external_order_id, payload)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(marketplace)
    .bind(external_order_id)
    .bind(payload)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Record how processing went. Best-effort: an error is logged, not returned.
pub async fn mark_webhook_outcome(
    pool: &PgPool,
    log_id: Uuid,
    processed: bool,
    order_id: Option<Uuid>,
    outcome: &str,
) {
    let result = sqlx::query(
        "UPDATE webhook_logs SET processed = $2, order_id = $3, outcome = $4 WHERE id = $1",
    )
    .bind(log_id)
    .bind(processed)
    .bind(order_id)
    .bind(outcome)
    .execute(pool)
    .await;

    if let Err(e) = result {
        tracing::warn!(log_id = %log_id, error = %e, "Failed to update webhook log outcome");
    }
}
