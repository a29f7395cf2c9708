//! Stock API handlers (manual corrections and the movement ledger)

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{CurrentUser, policy};
use crate::db::models::StockMovement;
use crate::error::AppResult;
use crate::fulfillment::stock;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    /// Positive = restock, negative = adjustment
    pub delta: i32,
}

#[derive(Debug, Serialize)]
pub struct AdjustResponse {
    pub movement_id: Uuid,
}

/// POST /api/products/{id}/stock/adjust (privileged)
pub async fn adjust(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<AdjustRequest>,
) -> AppResult<Json<AdjustResponse>> {
    policy::require(&user.role, policy::Action::AdjustStock)?;

    let mut tx = state.pool.begin().await?;
    let movement_id = stock::adjust(&mut tx, product_id, payload.delta, &user.name).await?;
    tx.commit().await?;

    Ok(Json(AdjustResponse { movement_id }))
}

/// GET /api/products/{id}/stock/movements
pub async fn movements(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<Vec<StockMovement>>> {
    policy::require(&user.role, policy::Action::ViewOrder)?;

    let movements = sqlx::query_as::<_, StockMovement>(
        "SELECT * FROM stock_movements WHERE product_id = $1 ORDER BY created_at",
    )
    .bind(product_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(movements))
}
