//! User persistence operations.
//!
//! All functions take a `&PgPool` and operate on the `users` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::state::UserRecord;

/// Insert or update a user.
pub async fn save(pool: &PgPool, record: &UserRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO users (id, username, name, password_hash, scopes, active, created_on)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         ON CONFLICT (id) DO UPDATE SET
            username = EXCLUDED.username,
            name = EXCLUDED.name,
            password_hash = EXCLUDED.password_hash,
            scopes = EXCLUDED.scopes,
            active = EXCLUDED.active",
    )
    .bind(record.id)
    .bind(&record.username)
    .bind(&record.name)
    .bind(&record.password_hash)
    .bind(&record.scopes)
    .bind(record.active)
    .bind(record.created_on)
    .execute(pool)
    .await?;
    Ok(())
}

/// Load all users for hydration.
pub async fn load_all(pool: &PgPool) -> Result<Vec<UserRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, UserRow>(
        "SELECT id, username, name, password_hash, scopes, active, created_on
         FROM users ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(UserRow::into_record).collect())
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    name: String,
    password_hash: String,
    scopes: Vec<String>,
    active: bool,
    created_on: DateTime<Utc>,
}

impl UserRow {
    fn into_record(self) -> UserRecord {
        UserRecord {
            id: self.id,
            username: self.username,
            name: self.name,
            password_hash: self.password_hash,
            scopes: self.scopes,
            active: self.active,
            created_on: self.created_on,
        }
    }
}
