//! # Accounts API
//!
//! Employee bank accounts. An account that already received a payment
//! line can only be (de)activated; its number, kind and bank are frozen.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use nomina_core::AccountKind;
use nomina_payroll::LineKind;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{not_found, persist_failed, Pagination};
use crate::auth::{require_scope, CallerIdentity};
use crate::error::AppError;
use crate::extractors::{extract_validated_json, require_text, Validate};
use crate::state::{AccountRecord, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/accounts", get(list_accounts).post(create_account))
        .route("/v1/accounts/:id", put(update_account).delete(delete_account))
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAccountRequest {
    pub number: String,
    #[schema(value_type = String, example = "payroll")]
    pub kind: AccountKind,
    #[serde(default = "default_active")]
    pub active: bool,
    pub bank_id: i64,
    pub employee_id: i64,
}

/// Edit request. The holder cannot change, so no employee id is taken.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateAccountRequest {
    pub number: String,
    #[schema(value_type = String, example = "payroll")]
    pub kind: AccountKind,
    pub active: bool,
    pub bank_id: i64,
}

impl Validate for CreateAccountRequest {
    fn validate(&self) -> Result<(), String> {
        require_text("number", &self.number, 30)
    }
}

impl Validate for UpdateAccountRequest {
    fn validate(&self) -> Result<(), String> {
        require_text("number", &self.number, 30)
    }
}

/// An account with bank, holder and creator names flattened in.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AccountResponse {
    pub id: i64,
    pub number: String,
    #[schema(value_type = String)]
    pub kind: AccountKind,
    pub kind_label: String,
    pub active: bool,
    pub bank_id: i64,
    pub bank: String,
    pub employee_id: i64,
    pub employee: String,
    pub created_on: DateTime<Utc>,
    pub created_by: i64,
    pub user: String,
}

impl AccountResponse {
    fn build(state: &AppState, a: AccountRecord) -> Self {
        Self {
            bank: state.banks.get(a.bank_id).map(|b| b.name).unwrap_or_default(),
            employee: state
                .employees
                .get(a.employee_id)
                .map(|e| e.full_name())
                .unwrap_or_default(),
            user: state
                .users
                .get(a.created_by)
                .map(|u| u.username)
                .unwrap_or_default(),
            kind_label: a.kind.label().to_string(),
            id: a.id,
            number: a.number,
            kind: a.kind,
            active: a.active,
            bank_id: a.bank_id,
            employee_id: a.employee_id,
            created_on: a.created_on,
            created_by: a.created_by,
        }
    }
}

fn require_bank(state: &AppState, id: i64) -> Result<(), AppError> {
    if state.banks.contains(id) {
        Ok(())
    } else {
        Err(AppError::Validation(format!("bank {id} does not exist")))
    }
}

/// GET /v1/accounts — List accounts.
#[utoipa::path(
    get,
    path = "/v1/accounts",
    params(Pagination),
    responses((status = 200, description = "Accounts", body = Vec<AccountResponse>)),
    tag = "accounts"
)]
async fn list_accounts(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<AccountResponse>>, AppError> {
    require_scope(&caller, &["accounts:read"])?;
    let page = pagination.page(state.accounts.list());
    Ok(Json(
        page.into_iter()
            .map(|a| AccountResponse::build(&state, a))
            .collect(),
    ))
}

/// POST /v1/accounts — Register an account.
#[utoipa::path(
    post,
    path = "/v1/accounts",
    request_body = CreateAccountRequest,
    responses(
        (status = 201, description = "Account created", body = AccountResponse),
        (status = 422, description = "Invalid request", body = crate::error::ErrorBody),
    ),
    tag = "accounts"
)]
async fn create_account(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreateAccountRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AccountResponse>), AppError> {
    require_scope(&caller, &["accounts:write"])?;
    let req = extract_validated_json(body)?;

    let _guard = state.payroll_lock.lock().await;
    let record = {
        require_bank(&state, req.bank_id)?;
        if !state.employees.contains(req.employee_id) {
            return Err(AppError::Validation(format!(
                "employee {} does not exist",
                req.employee_id
            )));
        }
        state.accounts.insert_with(|id| AccountRecord {
            id,
            number: req.number.trim().to_string(),
            kind: req.kind,
            active: req.active,
            bank_id: req.bank_id,
            employee_id: req.employee_id,
            created_on: Utc::now(),
            created_by: caller.user_id,
        })
    };

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::staff::save_account(pool, &record).await {
            state.accounts.remove(record.id);
            return Err(persist_failed("account", e));
        }
    }

    tracing::info!(
        account_id = record.id,
        employee_id = record.employee_id,
        created_by = caller.user_id,
        "account created"
    );
    Ok((StatusCode::CREATED, Json(AccountResponse::build(&state, record))))
}

/// PUT /v1/accounts/:id — Toggle an account, or edit it if never paid into.
///
/// When `active` differs from the stored flag only the flag changes.
#[utoipa::path(
    put,
    path = "/v1/accounts/{id}",
    params(("id" = i64, Path, description = "Account ID")),
    request_body = UpdateAccountRequest,
    responses(
        (status = 202, description = "Account updated", body = AccountResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Account already used", body = crate::error::ErrorBody),
    ),
    tag = "accounts"
)]
async fn update_account(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<i64>,
    body: Result<Json<UpdateAccountRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AccountResponse>), AppError> {
    require_scope(&caller, &["accounts:write"])?;
    let req = extract_validated_json(body)?;

    let _guard = state.payroll_lock.lock().await;
    let (previous, record) = {
        let current = state.accounts.get(id).ok_or_else(|| not_found("account", id))?;
        let toggling = current.active != req.active;
        if !toggling {
            if state.is_applied(LineKind::Payment, id) {
                return Err(AppError::Conflict(format!(
                    "account {id} already received payments and cannot be edited"
                )));
            }
            require_bank(&state, req.bank_id)?;
        }
        let record = state
            .accounts
            .try_update(id, |_, a| {
                if toggling {
                    a.active = req.active;
                } else {
                    a.number = req.number.trim().to_string();
                    a.kind = req.kind;
                    a.bank_id = req.bank_id;
                }
                Ok::<_, AppError>(a.clone())
            })
            .ok_or_else(|| not_found("account", id))??;
        (current, record)
    };

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::staff::save_account(pool, &record).await {
            state.accounts.restore(id, previous);
            return Err(persist_failed("account", e));
        }
    }

    tracing::info!(account_id = id, active = record.active, "account updated");
    Ok((StatusCode::ACCEPTED, Json(AccountResponse::build(&state, record))))
}

/// DELETE /v1/accounts/:id — Delete an account never paid into.
#[utoipa::path(
    delete,
    path = "/v1/accounts/{id}",
    params(("id" = i64, Path, description = "Account ID")),
    responses(
        (status = 204, description = "Account deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Account already used", body = crate::error::ErrorBody),
    ),
    tag = "accounts"
)]
async fn delete_account(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    require_scope(&caller, &["accounts:write"])?;

    let _guard = state.payroll_lock.lock().await;
    if state.is_applied(LineKind::Payment, id) {
        return Err(AppError::Conflict(format!(
            "account {id} already received payments and cannot be deleted"
        )));
    }
    let removed = state.accounts.remove(id).ok_or_else(|| not_found("account", id))?;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::staff::delete_account(pool, id).await {
            state.accounts.restore(id, removed);
            return Err(persist_failed("account", e));
        }
    }

    tracing::info!(account_id = id, "account deleted");
    Ok(StatusCode::NO_CONTENT)
}
