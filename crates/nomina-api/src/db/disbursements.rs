//! Disbursement and receipt persistence operations.
//!
//! A disbursement is written in one transaction together with its details,
//! receipts and receipt lines, and deleted the same way.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use nomina_core::{AccountKind, Money};
use nomina_payroll::LineKind;
use sqlx::PgPool;

use crate::state::{DetailRecord, DisbursementRecord, ReceiptLineRecord, ReceiptRecord};

/// Insert a disbursement with its details and receipts.
pub async fn insert(
    pool: &PgPool,
    disbursement: &DisbursementRecord,
    receipts: &[ReceiptRecord],
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO disbursements (id, period_number, period_date, period_start, period_end,
         total, digest, created_on, created_by)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(disbursement.id)
    .bind(disbursement.period_number as i32)
    .bind(disbursement.period_date)
    .bind(disbursement.period_start)
    .bind(disbursement.period_end)
    .bind(disbursement.total.cents())
    .bind(&disbursement.digest)
    .bind(disbursement.created_on)
    .bind(disbursement.created_by)
    .execute(&mut *tx)
    .await?;

    for (position, detail) in disbursement.details.iter().enumerate() {
        sqlx::query(
            "INSERT INTO disbursement_details (disbursement_id, position, account_id, employee_id,
             employee_name, bank_name, account_number, account_kind, amount)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(disbursement.id)
        .bind(position as i32)
        .bind(detail.account_id)
        .bind(detail.employee_id)
        .bind(&detail.employee_name)
        .bind(&detail.bank_name)
        .bind(&detail.account_number)
        .bind(detail.account_kind.code())
        .bind(detail.amount.cents())
        .execute(&mut *tx)
        .await?;
    }

    for receipt in receipts {
        sqlx::query(
            "INSERT INTO receipts (id, disbursement_id, employee_id, employee_name, amount,
             period_number, period_date, period_start, period_end, created_on)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(receipt.id)
        .bind(receipt.disbursement_id)
        .bind(receipt.employee_id)
        .bind(&receipt.employee_name)
        .bind(receipt.amount.cents())
        .bind(receipt.period_number as i32)
        .bind(receipt.period_date)
        .bind(receipt.period_start)
        .bind(receipt.period_end)
        .bind(receipt.created_on)
        .execute(&mut *tx)
        .await?;

        for (position, line) in receipt.lines.iter().enumerate() {
            sqlx::query(
                "INSERT INTO receipt_lines (receipt_id, position, kind, source_id, text, amount,
                 bank_name, account_number, account_kind)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(receipt.id)
            .bind(position as i32)
            .bind(line.kind.as_str())
            .bind(line.source_id)
            .bind(&line.text)
            .bind(line.amount.cents())
            .bind(&line.bank_name)
            .bind(&line.account_number)
            .bind(line.account_kind.map(AccountKind::code))
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;
    Ok(())
}

/// Delete a disbursement with its details, receipts and lines.
pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "DELETE FROM receipt_lines WHERE receipt_id IN
         (SELECT id FROM receipts WHERE disbursement_id = $1)",
    )
    .bind(id)
    .execute(&mut *tx)
    .await?;
    sqlx::query("DELETE FROM receipts WHERE disbursement_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM disbursement_details WHERE disbursement_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let result = sqlx::query("DELETE FROM disbursements WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(result.rows_affected() > 0)
}

/// Load all disbursements with their details for hydration.
pub async fn load_all_disbursements(pool: &PgPool) -> Result<Vec<DisbursementRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, DisbursementRow>(
        "SELECT id, period_number, period_date, period_start, period_end, total, digest,
         created_on, created_by
         FROM disbursements ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    let detail_rows = sqlx::query_as::<_, DetailRow>(
        "SELECT disbursement_id, account_id, employee_id, employee_name, bank_name,
         account_number, account_kind, amount
         FROM disbursement_details ORDER BY disbursement_id, position",
    )
    .fetch_all(pool)
    .await?;

    let mut details: BTreeMap<i64, Vec<DetailRecord>> = BTreeMap::new();
    for row in detail_rows {
        let disbursement_id = row.disbursement_id;
        if let Some(detail) = row.into_record() {
            details.entry(disbursement_id).or_default().push(detail);
        }
    }

    Ok(rows
        .into_iter()
        .map(|r| DisbursementRecord {
            id: r.id,
            period_number: r.period_number as u32,
            period_date: r.period_date,
            period_start: r.period_start,
            period_end: r.period_end,
            total: Money::from_cents(r.total),
            digest: r.digest,
            created_on: r.created_on,
            created_by: r.created_by,
            details: details.remove(&r.id).unwrap_or_default(),
        })
        .collect())
}

/// Load all receipts with their lines for hydration.
pub async fn load_all_receipts(pool: &PgPool) -> Result<Vec<ReceiptRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ReceiptRow>(
        "SELECT id, disbursement_id, employee_id, employee_name, amount, period_number,
         period_date, period_start, period_end, created_on
         FROM receipts ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    let line_rows = sqlx::query_as::<_, ReceiptLineRow>(
        "SELECT receipt_id, kind, source_id, text, amount, bank_name, account_number, account_kind
         FROM receipt_lines ORDER BY receipt_id, position",
    )
    .fetch_all(pool)
    .await?;

    let mut lines: BTreeMap<i64, Vec<ReceiptLineRecord>> = BTreeMap::new();
    for row in line_rows {
        let receipt_id = row.receipt_id;
        if let Some(line) = row.into_record() {
            lines.entry(receipt_id).or_default().push(line);
        }
    }

    Ok(rows
        .into_iter()
        .map(|r| ReceiptRecord {
            id: r.id,
            disbursement_id: r.disbursement_id,
            employee_id: r.employee_id,
            employee_name: r.employee_name,
            amount: Money::from_cents(r.amount),
            period_number: r.period_number as u32,
            period_date: r.period_date,
            period_start: r.period_start,
            period_end: r.period_end,
            created_on: r.created_on,
            lines: lines.remove(&r.id).unwrap_or_default(),
        })
        .collect())
}

#[derive(sqlx::FromRow)]
struct DisbursementRow {
    id: i64,
    period_number: i32,
    period_date: NaiveDate,
    period_start: NaiveDate,
    period_end: NaiveDate,
    total: i64,
    digest: String,
    created_on: DateTime<Utc>,
    created_by: i64,
}

#[derive(sqlx::FromRow)]
struct DetailRow {
    disbursement_id: i64,
    account_id: i64,
    employee_id: i64,
    employee_name: String,
    bank_name: String,
    account_number: String,
    account_kind: i16,
    amount: i64,
}

impl DetailRow {
    fn into_record(self) -> Option<DetailRecord> {
        let account_kind = match AccountKind::from_code(self.account_kind) {
            Ok(kind) => kind,
            Err(e) => {
                tracing::error!(
                    disbursement_id = self.disbursement_id,
                    error = %e,
                    "skipping disbursement detail with invalid account kind"
                );
                return None;
            }
        };
        Some(DetailRecord {
            account_id: self.account_id,
            employee_id: self.employee_id,
            employee_name: self.employee_name,
            bank_name: self.bank_name,
            account_number: self.account_number,
            account_kind,
            amount: Money::from_cents(self.amount),
        })
    }
}

#[derive(sqlx::FromRow)]
struct ReceiptRow {
    id: i64,
    disbursement_id: i64,
    employee_id: i64,
    employee_name: String,
    amount: i64,
    period_number: i32,
    period_date: NaiveDate,
    period_start: NaiveDate,
    period_end: NaiveDate,
    created_on: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ReceiptLineRow {
    receipt_id: i64,
    kind: String,
    source_id: i64,
    text: String,
    amount: i64,
    bank_name: Option<String>,
    account_number: Option<String>,
    account_kind: Option<i16>,
}

impl ReceiptLineRow {
    fn into_record(self) -> Option<ReceiptLineRecord> {
        let Some(kind) = LineKind::parse(&self.kind) else {
            tracing::error!(
                receipt_id = self.receipt_id,
                kind = %self.kind,
                "skipping receipt line with unknown kind"
            );
            return None;
        };
        let account_kind = match self.account_kind.map(AccountKind::from_code).transpose() {
            Ok(kind) => kind,
            Err(e) => {
                tracing::error!(receipt_id = self.receipt_id, error = %e, "skipping receipt line with invalid account kind");
                return None;
            }
        };
        Some(ReceiptLineRecord {
            kind,
            source_id: self.source_id,
            text: self.text,
            amount: Money::from_cents(self.amount),
            bank_name: self.bank_name,
            account_number: self.account_number,
            account_kind,
        })
    }
}
