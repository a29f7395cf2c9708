//! Commission engine
//!
//! Computes payout records from the commission configuration effective at
//! the time of the order, and advances them through the
//! `pending → approved → paid` workflow (`cancelled` from pending or
//! approved). Approval is coupled to payment confirmation by the
//! coordinator; cancellation only ever happens through the coordinator's
//! order-cancellation path.

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::db::models::{CommissionRole, CommissionStatus, CommissionType};
use crate::error::AppError;

/// Commission amount for a given config and order total, rounded to cents.
pub fn compute_amount(commission_type: CommissionType, value: Decimal, order_total: Decimal) -> Decimal {
    match commission_type {
        CommissionType::Percentage => (order_total * value / Decimal::from(100)).round_dp(2),
        CommissionType::Fixed => value,
    }
}

/// Look up the active config for `actor_id` and persist a `pending` record.
///
/// Returns `None` (and writes nothing) when no config is effective right
/// now. The data layer guarantees at most one active config per actor per
/// instant, so `fetch_optional` is unambiguous.
pub async fn calculate(
    conn: &mut PgConnection,
    actor_id: Uuid,
    role: CommissionRole,
    order_id: Uuid,
    order_total: Decimal,
) -> Result<Option<Uuid>, AppError> {
    let config: Option<(String, Decimal)> = sqlx::query_as(
        r#"
        SELECT commission_type, value
        FROM commission_configs
        WHERE actor_id = $1
          AND is_active
          AND effective_from <= $2
          AND effective_until > $2
        "#,
    )
    .bind(actor_id)
    .bind(Utc::now())
    .fetch_optional(&mut *conn)
    .await?;

    let Some((type_str, value)) = config else {
        return Ok(None);
    };
    let commission_type = CommissionType::parse(&type_str)?;
    let amount = compute_amount(commission_type, value, order_total);

    let (record_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO commission_records
            (actor_id, order_id, actor_role, amount, rate, order_total, status)
        VALUES ($1, $2, $3, $4, $5, $6, 'pending')
        RETURNING id
        "#,
    )
    .bind(actor_id)
    .bind(order_id)
    .bind(role.as_str())
    .bind(amount)
    .bind(value)
    .bind(order_total)
    .fetch_one(&mut *conn)
    .await?;

    Ok(Some(record_id))
}

/// Approve every `pending` record of an order, stamping approver and time.
/// `approver` is `None` when the transition is system-driven (pre-paid
/// marketplace orders).
///
/// Idempotent: a second call matches zero rows and is not an error.
pub async fn approve_for_order(
    conn: &mut PgConnection,
    order_id: Uuid,
    approver: Option<Uuid>,
) -> Result<u64, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE commission_records
        SET status = 'approved', approved_by = $2, approved_at = now()
        WHERE order_id = $1 AND status = 'pending'
        "#,
    )
    .bind(order_id)
    .bind(approver)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// Approve a single record (admin endpoint).
pub async fn approve_record(pool: &PgPool, record_id: Uuid, approver: Uuid) -> Result<(), AppError> {
    let result = sqlx::query(
        r#"
        UPDATE commission_records
        SET status = 'approved', approved_by = $2, approved_at = now()
        WHERE id = $1 AND status = 'pending'
        "#,
    )
    .bind(record_id)
    .bind(approver)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(transition_failure(pool, record_id, CommissionStatus::Approved).await?);
    }
    Ok(())
}

/// Mark a record paid. Only valid from `approved`.
pub async fn mark_paid(pool: &PgPool, record_id: Uuid, payer: Uuid) -> Result<(), AppError> {
    let result = sqlx::query(
        r#"
        UPDATE commission_records
        SET status = 'paid', paid_by = $2, paid_at = now()
        WHERE id = $1 AND status = 'approved'
        "#,
    )
    .bind(record_id)
    .bind(payer)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(transition_failure(pool, record_id, CommissionStatus::Paid).await?);
    }
    Ok(())
}

/// Cancel `pending`/`approved` records of an order. Coordinator-only,
/// runs inside the cancellation transaction.
pub async fn cancel_for_order(conn: &mut PgConnection, order_id: Uuid) -> Result<u64, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE commission_records
        SET status = 'cancelled'
        WHERE order_id = $1 AND status IN ('pending', 'approved')
        "#,
    )
    .bind(order_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// A conditional UPDATE matched no row: distinguish "record missing" from
/// "record exists in the wrong state" for the error response.
async fn transition_failure(
    pool: &PgPool,
    record_id: Uuid,
    target: CommissionStatus,
) -> Result<AppError, AppError> {
    let current: Option<(String,)> =
        sqlx::query_as("SELECT status FROM commission_records WHERE id = $1")
            .bind(record_id)
            .fetch_optional(pool)
            .await?;

    Ok(match current {
        None => AppError::not_found(format!("Commission record {record_id} not found")),
        Some((status,)) => AppError::invalid_transition(format!(
            "Commission record {record_id}: {status} -> {}",
            target.as_str()
        )),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn percentage_of_order_total() {
        // order total 1000.00, 5% config -> 50.00
        let amount = compute_amount(CommissionType::Percentage, d("5"), d("1000.00"));
        assert_eq!(amount, d("50.00"));
    }

    #[test]
    fn percentage_rounds_to_cents() {
        // 33.33 * 7.5% = 2.49975 -> 2.50 (banker's rounding on the half cent)
        let amount = compute_amount(CommissionType::Percentage, d("7.5"), d("33.33"));
        assert_eq!(amount, d("2.50"));
    }

    #[test]
    fn fixed_ignores_order_total() {
        let amount = compute_amount(CommissionType::Fixed, d("15.00"), d("9999.99"));
        assert_eq!(amount, d("15.00"));
    }

    #[test]
    fn zero_total_percentage_is_zero() {
        let amount = compute_amount(CommissionType::Percentage, d("10"), d("0"));
        assert_eq!(amount, d("0"));
    }
}
