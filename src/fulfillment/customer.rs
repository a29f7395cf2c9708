//! Customer resolver
//!
//! Idempotent find-or-create by unique email. Create-then-reconcile:
//! `INSERT ... ON CONFLICT DO NOTHING` followed by a re-read, so two
//! concurrent first-time resolutions of the same email converge on one
//! row instead of racing a lookup. Existing profile data always wins;
//! resolution never overwrites stored fields.

use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::db::models::CustomerProfile;
use crate::error::AppError;
use crate::util::{MAX_EMAIL_LEN, validate_required_text};

/// Resolve an email to exactly one customer id, creating the row if needed.
pub async fn resolve(
    conn: &mut PgConnection,
    profile: &CustomerProfile,
) -> Result<Uuid, AppError> {
    validate_required_text(&profile.email, "customer email", MAX_EMAIL_LEN)?;
    let email = profile.email.trim().to_lowercase();

    let inserted: Option<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO customers (email, name, phone, address)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(&email)
    .bind(&profile.name)
    .bind(&profile.phone)
    .bind(&profile.address)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some((id,)) = inserted {
        tracing::info!(customer_id = %id, "Created customer during resolution");
        return Ok(id);
    }

    // Conflict: the row already existed (or a concurrent transaction just
    // created it). Re-read and return the existing id untouched.
    let (id,): (Uuid,) = sqlx::query_as("SELECT id FROM customers WHERE email = $1")
        .bind(&email)
        .fetch_one(&mut *conn)
        .await?;

    Ok(id)
}

/// Verify that a directly referenced customer exists.
pub async fn ensure_exists(conn: &mut PgConnection, customer_id: Uuid) -> Result<(), AppError> {
    let found: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM customers WHERE id = $1")
        .bind(customer_id)
        .fetch_optional(&mut *conn)
        .await?;

    found
        .map(|_| ())
        .ok_or_else(|| AppError::not_found(format!("Customer {customer_id} not found")))
}

/// Increment the customer aggregates for one committed order.
///
/// This is the only writer of `total_orders` / `total_spent`, and it runs
/// inside the same transaction as the order insert — exactly once per
/// committed order.
pub async fn record_order(
    conn: &mut PgConnection,
    customer_id: Uuid,
    order_total: Decimal,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE customers
        SET total_orders = total_orders + 1,
            total_spent = total_spent + $2
        WHERE id = $1
        "#,
    )
    .bind(customer_id)
    .bind(order_total)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
