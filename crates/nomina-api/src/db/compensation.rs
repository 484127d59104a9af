//! Salary, loan and adjustment persistence operations.

use chrono::{DateTime, NaiveDate, Utc};
use nomina_core::Money;
use sqlx::PgPool;

use crate::state::{AdjustmentRecord, LoanRecord, SalaryRecord};

// ── Salaries ────────────────────────────────────────────────────────

/// Insert or update a salary.
pub async fn save_salary(pool: &PgPool, record: &SalaryRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO salaries (id, employee_id, valid_from, amount, created_on, created_by)
         VALUES ($1, $2, $3, $4, $5, $6)
         ON CONFLICT (id) DO UPDATE SET
            valid_from = EXCLUDED.valid_from,
            amount = EXCLUDED.amount",
    )
    .bind(record.id)
    .bind(record.employee_id)
    .bind(record.valid_from)
    .bind(record.amount.cents())
    .bind(record.created_on)
    .bind(record.created_by)
    .execute(pool)
    .await?;
    Ok(())
}

/// Delete a salary. Returns whether a row was removed.
pub async fn delete_salary(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM salaries WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Load all salaries for hydration.
pub async fn load_all_salaries(pool: &PgPool) -> Result<Vec<SalaryRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, SalaryRow>(
        "SELECT id, employee_id, valid_from, amount, created_on, created_by
         FROM salaries ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|r| SalaryRecord {
            id: r.id,
            employee_id: r.employee_id,
            valid_from: r.valid_from,
            amount: Money::from_cents(r.amount),
            created_on: r.created_on,
            created_by: r.created_by,
        })
        .collect())
}

#[derive(sqlx::FromRow)]
struct SalaryRow {
    id: i64,
    employee_id: i64,
    valid_from: NaiveDate,
    amount: i64,
    created_on: DateTime<Utc>,
    created_by: i64,
}

// ── Loans ───────────────────────────────────────────────────────────

/// Insert or update a loan.
pub async fn save_loan(pool: &PgPool, record: &LoanRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO loans (id, employee_id, start_date, amount, installment, comment, created_on, created_by)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         ON CONFLICT (id) DO UPDATE SET
            start_date = EXCLUDED.start_date,
            amount = EXCLUDED.amount,
            installment = EXCLUDED.installment,
            comment = EXCLUDED.comment",
    )
    .bind(record.id)
    .bind(record.employee_id)
    .bind(record.start_date)
    .bind(record.amount.cents())
    .bind(record.installment.cents())
    .bind(&record.comment)
    .bind(record.created_on)
    .bind(record.created_by)
    .execute(pool)
    .await?;
    Ok(())
}

/// Delete a loan. Returns whether a row was removed.
pub async fn delete_loan(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM loans WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Load all loans for hydration.
pub async fn load_all_loans(pool: &PgPool) -> Result<Vec<LoanRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, LoanRow>(
        "SELECT id, employee_id, start_date, amount, installment, comment, created_on, created_by
         FROM loans ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|r| LoanRecord {
            id: r.id,
            employee_id: r.employee_id,
            start_date: r.start_date,
            amount: Money::from_cents(r.amount),
            installment: Money::from_cents(r.installment),
            comment: r.comment,
            created_on: r.created_on,
            created_by: r.created_by,
        })
        .collect())
}

#[derive(sqlx::FromRow)]
struct LoanRow {
    id: i64,
    employee_id: i64,
    start_date: NaiveDate,
    amount: i64,
    installment: i64,
    comment: Option<String>,
    created_on: DateTime<Utc>,
    created_by: i64,
}

// ── Adjustments ─────────────────────────────────────────────────────

/// Insert or update an adjustment.
pub async fn save_adjustment(pool: &PgPool, record: &AdjustmentRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO adjustments (id, employee_id, start_date, end_date, reason, amount, created_on, created_by)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         ON CONFLICT (id) DO UPDATE SET
            start_date = EXCLUDED.start_date,
            end_date = EXCLUDED.end_date,
            reason = EXCLUDED.reason,
            amount = EXCLUDED.amount",
    )
    .bind(record.id)
    .bind(record.employee_id)
    .bind(record.start_date)
    .bind(record.end_date)
    .bind(&record.reason)
    .bind(record.amount.cents())
    .bind(record.created_on)
    .bind(record.created_by)
    .execute(pool)
    .await?;
    Ok(())
}

/// Delete an adjustment. Returns whether a row was removed.
pub async fn delete_adjustment(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM adjustments WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Load all adjustments for hydration.
pub async fn load_all_adjustments(pool: &PgPool) -> Result<Vec<AdjustmentRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, AdjustmentRow>(
        "SELECT id, employee_id, start_date, end_date, reason, amount, created_on, created_by
         FROM adjustments ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|r| AdjustmentRecord {
            id: r.id,
            employee_id: r.employee_id,
            start_date: r.start_date,
            end_date: r.end_date,
            reason: r.reason,
            amount: Money::from_cents(r.amount),
            created_on: r.created_on,
            created_by: r.created_by,
        })
        .collect())
}

#[derive(sqlx::FromRow)]
struct AdjustmentRow {
    id: i64,
    employee_id: i64,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    reason: String,
    amount: i64,
    created_on: DateTime<Utc>,
    created_by: i64,
}
