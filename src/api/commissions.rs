//! Commission API handlers

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::auth::{CurrentUser, policy};
use crate::db::models::CommissionRecord;
use crate::error::{AppError, AppResult};
use crate::fulfillment::commission;
use crate::state::AppState;

/// PATCH /api/commissions/{id}/approve (privileged)
pub async fn approve(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    policy::require(&user.role, policy::Action::ApproveCommission)?;
    let approver = user
        .id
        .ok_or_else(|| AppError::forbidden("Approval requires an identified staff member"))?;

    commission::approve_record(&state.pool, id, approver).await?;
    Ok(StatusCode::OK)
}

/// PATCH /api/commissions/{id}/paid (privileged)
pub async fn mark_paid(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    policy::require(&user.role, policy::Action::PayCommission)?;
    let payer = user
        .id
        .ok_or_else(|| AppError::forbidden("Payout requires an identified staff member"))?;

    commission::mark_paid(&state.pool, id, payer).await?;
    Ok(StatusCode::OK)
}

/// GET /api/commissions/order/{order_id}
pub async fn list_for_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<Vec<CommissionRecord>>> {
    policy::require(&user.role, policy::Action::ViewOrder)?;

    let records = sqlx::query_as::<_, CommissionRecord>(
        "SELECT * FROM commission_records WHERE order_id = $1 ORDER BY created_at",
    )
    .bind(order_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(records))
}
