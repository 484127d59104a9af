//! Neighborhood and bank persistence operations.

use sqlx::PgPool;

use crate::state::{AccountRecord, BankRecord, NeighborhoodRecord};

/// Insert or update a neighborhood.
pub async fn save_neighborhood(pool: &PgPool, record: &NeighborhoodRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO neighborhoods (id, name, city, state, postal_code)
         VALUES ($1, $2, $3, $4, $5)
         ON CONFLICT (id) DO UPDATE SET
            name = EXCLUDED.name,
            city = EXCLUDED.city,
            state = EXCLUDED.state,
            postal_code = EXCLUDED.postal_code",
    )
    .bind(record.id)
    .bind(&record.name)
    .bind(&record.city)
    .bind(&record.state)
    .bind(&record.postal_code)
    .execute(pool)
    .await?;
    Ok(())
}

/// Load all neighborhoods for hydration.
pub async fn load_all_neighborhoods(pool: &PgPool) -> Result<Vec<NeighborhoodRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, NeighborhoodRow>(
        "SELECT id, name, city, state, postal_code FROM neighborhoods ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|r| NeighborhoodRecord {
            id: r.id,
            name: r.name,
            city: r.city,
            state: r.state,
            postal_code: r.postal_code,
        })
        .collect())
}

/// Insert or update a bank.
pub async fn save_bank(pool: &PgPool, record: &BankRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO banks (id, name, active) VALUES ($1, $2, $3)
         ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, active = EXCLUDED.active",
    )
    .bind(record.id)
    .bind(&record.name)
    .bind(record.active)
    .execute(pool)
    .await?;
    Ok(())
}

/// Save a bank together with the accounts its deactivation touched.
pub async fn save_bank_with_accounts(
    pool: &PgPool,
    bank: &BankRecord,
    accounts: &[AccountRecord],
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE banks SET name = $1, active = $2 WHERE id = $3")
        .bind(&bank.name)
        .bind(bank.active)
        .bind(bank.id)
        .execute(&mut *tx)
        .await?;

    for account in accounts {
        sqlx::query("UPDATE accounts SET active = $1 WHERE id = $2")
            .bind(account.active)
            .bind(account.id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Delete a bank. Returns whether a row was removed.
pub async fn delete_bank(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM banks WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Load all banks for hydration.
pub async fn load_all_banks(pool: &PgPool) -> Result<Vec<BankRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, BankRow>("SELECT id, name, active FROM banks ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|r| BankRecord {
            id: r.id,
            name: r.name,
            active: r.active,
        })
        .collect())
}

#[derive(sqlx::FromRow)]
struct NeighborhoodRow {
    id: i64,
    name: String,
    city: String,
    state: String,
    postal_code: String,
}

#[derive(sqlx::FromRow)]
struct BankRow {
    id: i64,
    name: String,
    active: bool,
}
