//! # API Route Modules
//!
//! - `users` — token issuance, user administration, `/me`.
//! - `catalog` — neighborhoods and banks.
//! - `employees` — employee records with embedded neighborhood.
//! - `accounts` — employee bank accounts.
//! - `salaries`, `loans`, `adjustments` — compensation inputs to a run.
//! - `disbursements` — payroll runs (preview, store, delete latest).
//! - `receipts` — per-employee receipts produced by runs.
//!
//! Every handler here sits behind the auth middleware except
//! `POST /v1/users/token`, which [`users::token_router`] mounts separately.

pub mod accounts;
pub mod adjustments;
pub mod catalog;
pub mod disbursements;
pub mod employees;
pub mod loans;
pub mod receipts;
pub mod salaries;
pub mod users;

use axum::Router;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::AppError;
use crate::state::AppState;

/// All authenticated `/v1` routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(users::router())
        .merge(catalog::router())
        .merge(employees::router())
        .merge(accounts::router())
        .merge(salaries::router())
        .merge(loans::router())
        .merge(adjustments::router())
        .merge(disbursements::router())
        .merge(receipts::router())
}

/// Pagination parameters for list endpoints.
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct Pagination {
    /// Number of items to skip (default: 0).
    pub skip: Option<usize>,
    /// Maximum number of items to return (default: 10, max: 1000).
    pub limit: Option<usize>,
}

impl Pagination {
    const DEFAULT_LIMIT: usize = 10;
    const MAX_LIMIT: usize = 1000;

    fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT).min(Self::MAX_LIMIT)
    }

    /// Apply skip and limit to `items`.
    pub fn page<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.skip.unwrap_or(0))
            .take(self.effective_limit())
            .collect()
    }
}

/// Log a failed write-through and turn it into a 500.
///
/// The in-memory store already holds the change, so a restart would lose
/// it. The client is told the request failed.
pub(crate) fn persist_failed(what: &str, err: sqlx::Error) -> AppError {
    tracing::error!(resource = what, error = %err, "failed to persist to database");
    AppError::Internal(format!("database write failed for {what}: {err}"))
}

pub(crate) fn not_found(what: &str, id: i64) -> AppError {
    AppError::NotFound(format!("{what} {id} not found"))
}

/// Run a CPU-heavy closure off the async executor.
pub(crate) async fn blocking<T: Send + 'static>(
    f: impl FnOnce() -> T + Send + 'static,
) -> Result<T, AppError> {
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(format!("blocking task failed: {e}")))
}
