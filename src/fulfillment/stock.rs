//! Stock ledger
//!
//! Owns `products.stock_quantity` and the append-only `stock_movements`
//! log. Every mutation runs inside the caller's transaction and takes a
//! `SELECT ... FOR UPDATE` row lock first, so two concurrent deductions
//! against the same product cannot both observe the pre-decrement
//! quantity. A rollback of the enclosing transaction releases the lock and
//! undoes the counter change together with every other write of the unit.
//!
//! Callers deducting multiple products must lock in canonical order
//! (sorted by product id) to avoid cross-order deadlock; the coordinator
//! sorts line items before calling in here.

use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::db::models::MovementType;
use crate::error::AppError;

/// Outcome of a successful deduction
#[derive(Debug)]
pub struct Deduction {
    pub movement_id: Uuid,
    /// Quantity remaining after the decrement (used for low-stock alerts)
    pub remaining: i32,
    pub low_stock_threshold: i32,
    /// Unit cost snapshot for the order item
    pub unit_cost: Decimal,
}

/// Lock the product row and re-read the authoritative quantity.
async fn lock_row(
    conn: &mut PgConnection,
    product_id: Uuid,
) -> Result<(i32, i32, Decimal), AppError> {
    let row: Option<(i32, i32, Decimal)> = sqlx::query_as(
        "SELECT stock_quantity, low_stock_threshold, cost FROM products WHERE id = $1 FOR UPDATE",
    )
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?;

    row.ok_or_else(|| AppError::not_found(format!("Product {product_id} not found")))
}

async fn append_movement(
    conn: &mut PgConnection,
    product_id: Uuid,
    delta: i32,
    movement_type: MovementType,
    reference: &str,
    actor: &str,
) -> Result<Uuid, AppError> {
    let (movement_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO stock_movements (product_id, delta, movement_type, reference, actor)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(product_id)
    .bind(delta)
    .bind(movement_type.as_str())
    .bind(reference)
    .bind(actor)
    .fetch_one(&mut *conn)
    .await?;

    Ok(movement_id)
}

/// Deduct `qty` units for a sale.
///
/// Fails with [`AppError::InsufficientStock`] when the locked quantity is
/// lower than requested; in that case nothing has been written.
pub async fn deduct(
    conn: &mut PgConnection,
    product_id: Uuid,
    qty: i32,
    reference: &str,
    actor: &str,
) -> Result<Deduction, AppError> {
    let (available, low_stock_threshold, unit_cost) = lock_row(&mut *conn, product_id).await?;

    if qty > available {
        return Err(AppError::InsufficientStock {
            product_id,
            requested: qty,
            available,
        });
    }

    sqlx::query("UPDATE products SET stock_quantity = stock_quantity - $2 WHERE id = $1")
        .bind(product_id)
        .bind(qty)
        .execute(&mut *conn)
        .await?;

    let movement_id =
        append_movement(&mut *conn, product_id, -qty, MovementType::Sale, reference, actor).await?;

    Ok(Deduction {
        movement_id,
        remaining: available - qty,
        low_stock_threshold,
        unit_cost,
    })
}

/// Restore `qty` units on cancellation, with a `reversal` movement.
pub async fn restore(
    conn: &mut PgConnection,
    product_id: Uuid,
    qty: i32,
    reference: &str,
    actor: &str,
) -> Result<Uuid, AppError> {
    lock_row(&mut *conn, product_id).await?;

    sqlx::query("UPDATE products SET stock_quantity = stock_quantity + $2 WHERE id = $1")
        .bind(product_id)
        .bind(qty)
        .execute(&mut *conn)
        .await?;

    append_movement(&mut *conn, product_id, qty, MovementType::Reversal, reference, actor).await
}

/// Manual correction: positive delta is a `restock`, negative an
/// `adjustment`. A negative adjustment may not take the counter below zero.
pub async fn adjust(
    conn: &mut PgConnection,
    product_id: Uuid,
    delta: i32,
    actor: &str,
) -> Result<Uuid, AppError> {
    if delta == 0 {
        return Err(AppError::validation("Stock adjustment delta must be non-zero"));
    }
    // i32::MIN has no positive counterpart; negating it below would overflow
    let Some(magnitude) = delta.checked_neg() else {
        return Err(AppError::validation("Stock adjustment delta is out of range"));
    };

    let (available, _, _) = lock_row(&mut *conn, product_id).await?;

    if delta < 0 && magnitude > available {
        return Err(AppError::InsufficientStock {
            product_id,
            requested: magnitude,
            available,
        });
    }

    sqlx::query("UPDATE products SET stock_quantity = stock_quantity + $2 WHERE id = $1")
        .bind(product_id)
        .bind(delta)
        .execute(&mut *conn)
        .await?;

    let movement_type = if delta > 0 {
        MovementType::Restock
    } else {
        MovementType::Adjustment
    };
    append_movement(&mut *conn, product_id, delta, movement_type, "manual", actor).await
}
