//! Employee and account persistence operations.

use chrono::{DateTime, Utc};
use nomina_core::{AccountKind, Curp, Rfc};
use sqlx::PgPool;

use crate::state::{AccountRecord, EmployeeRecord};

/// Insert or update an employee.
pub async fn save_employee(pool: &PgPool, record: &EmployeeRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO employees (id, name, paternal_surname, maternal_surname, rfc, curp,
         street, exterior_number, interior_number, neighborhood_id, phone, mobile, active, created_on)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
         ON CONFLICT (id) DO UPDATE SET
            name = EXCLUDED.name,
            paternal_surname = EXCLUDED.paternal_surname,
            maternal_surname = EXCLUDED.maternal_surname,
            rfc = EXCLUDED.rfc,
            curp = EXCLUDED.curp,
            street = EXCLUDED.street,
            exterior_number = EXCLUDED.exterior_number,
            interior_number = EXCLUDED.interior_number,
            neighborhood_id = EXCLUDED.neighborhood_id,
            phone = EXCLUDED.phone,
            mobile = EXCLUDED.mobile,
            active = EXCLUDED.active",
    )
    .bind(record.id)
    .bind(&record.name)
    .bind(&record.paternal_surname)
    .bind(&record.maternal_surname)
    .bind(record.rfc.as_str())
    .bind(record.curp.as_str())
    .bind(&record.street)
    .bind(&record.exterior_number)
    .bind(&record.interior_number)
    .bind(record.neighborhood_id)
    .bind(&record.phone)
    .bind(&record.mobile)
    .bind(record.active)
    .bind(record.created_on)
    .execute(pool)
    .await?;
    Ok(())
}

/// Load all employees for hydration. Rows with malformed identifiers are skipped.
pub async fn load_all_employees(pool: &PgPool) -> Result<Vec<EmployeeRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, EmployeeRow>(
        "SELECT id, name, paternal_surname, maternal_surname, rfc, curp, street,
         exterior_number, interior_number, neighborhood_id, phone, mobile, active, created_on
         FROM employees ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().filter_map(EmployeeRow::into_record).collect())
}

/// Insert or update an account.
pub async fn save_account(pool: &PgPool, record: &AccountRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO accounts (id, number, kind, active, bank_id, employee_id, created_on, created_by)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         ON CONFLICT (id) DO UPDATE SET
            number = EXCLUDED.number,
            kind = EXCLUDED.kind,
            active = EXCLUDED.active,
            bank_id = EXCLUDED.bank_id",
    )
    .bind(record.id)
    .bind(&record.number)
    .bind(record.kind.code())
    .bind(record.active)
    .bind(record.bank_id)
    .bind(record.employee_id)
    .bind(record.created_on)
    .bind(record.created_by)
    .execute(pool)
    .await?;
    Ok(())
}

/// Delete an account. Returns whether a row was removed.
pub async fn delete_account(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Load all accounts for hydration. Rows with an unknown kind are skipped.
pub async fn load_all_accounts(pool: &PgPool) -> Result<Vec<AccountRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, AccountRow>(
        "SELECT id, number, kind, active, bank_id, employee_id, created_on, created_by
         FROM accounts ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().filter_map(AccountRow::into_record).collect())
}

#[derive(sqlx::FromRow)]
struct EmployeeRow {
    id: i64,
    name: String,
    paternal_surname: String,
    maternal_surname: String,
    rfc: String,
    curp: String,
    street: String,
    exterior_number: String,
    interior_number: Option<String>,
    neighborhood_id: i64,
    phone: Option<String>,
    mobile: Option<String>,
    active: bool,
    created_on: DateTime<Utc>,
}

impl EmployeeRow {
    fn into_record(self) -> Option<EmployeeRecord> {
        let (rfc, curp) = match (Rfc::new(self.rfc.as_str()), Curp::new(self.curp.as_str())) {
            (Ok(rfc), Ok(curp)) => (rfc, curp),
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!(id = self.id, error = %e, "skipping employee row with invalid identifier");
                return None;
            }
        };
        Some(EmployeeRecord {
            id: self.id,
            name: self.name,
            paternal_surname: self.paternal_surname,
            maternal_surname: self.maternal_surname,
            rfc,
            curp,
            street: self.street,
            exterior_number: self.exterior_number,
            interior_number: self.interior_number,
            neighborhood_id: self.neighborhood_id,
            phone: self.phone,
            mobile: self.mobile,
            active: self.active,
            created_on: self.created_on,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: i64,
    number: String,
    kind: i16,
    active: bool,
    bank_id: i64,
    employee_id: i64,
    created_on: DateTime<Utc>,
    created_by: i64,
}

impl AccountRow {
    fn into_record(self) -> Option<AccountRecord> {
        let kind = match AccountKind::from_code(self.kind) {
            Ok(kind) => kind,
            Err(e) => {
                tracing::error!(id = self.id, error = %e, "skipping account row with invalid kind");
                return None;
            }
        };
        Some(AccountRecord {
            id: self.id,
            number: self.number,
            kind,
            active: self.active,
            bank_id: self.bank_id,
            employee_id: self.employee_id,
            created_on: self.created_on,
            created_by: self.created_by,
        })
    }
}
