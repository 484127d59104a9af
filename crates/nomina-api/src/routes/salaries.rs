//! # Salaries API
//!
//! A salary is the per-period amount paid from `valid_from` until a later
//! salary of the same employee applies. Each new salary must start after
//! every other salary of the employee. Salaries referenced by a receipt
//! are frozen.

use std::collections::BTreeMap;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use nomina_core::Money;
use nomina_payroll::LineKind;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{not_found, persist_failed, Pagination};
use crate::auth::{require_scope, CallerIdentity};
use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::state::{AppState, SalaryRecord};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/salaries", get(list_salaries).post(create_salary))
        .route("/v1/salaries/:id", put(update_salary).delete(delete_salary))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateSalaryRequest {
    pub employee_id: i64,
    pub valid_from: NaiveDate,
    #[schema(value_type = String, example = "7500.00")]
    pub amount: Money,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateSalaryRequest {
    pub valid_from: NaiveDate,
    #[schema(value_type = String, example = "7500.00")]
    pub amount: Money,
}

fn positive(amount: Money) -> Result<(), String> {
    if amount.is_positive() {
        Ok(())
    } else {
        Err("amount must be greater than zero".into())
    }
}

impl Validate for CreateSalaryRequest {
    fn validate(&self) -> Result<(), String> {
        positive(self.amount)
    }
}

impl Validate for UpdateSalaryRequest {
    fn validate(&self) -> Result<(), String> {
        positive(self.amount)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SalaryResponse {
    pub id: i64,
    pub employee_id: i64,
    pub employee: String,
    pub valid_from: NaiveDate,
    #[schema(value_type = String)]
    pub amount: Money,
    pub created_on: DateTime<Utc>,
    pub created_by: i64,
    pub user: String,
}

impl SalaryResponse {
    fn build(state: &AppState, s: SalaryRecord) -> Self {
        Self {
            employee: state
                .employees
                .get(s.employee_id)
                .map(|e| e.full_name())
                .unwrap_or_default(),
            user: state
                .users
                .get(s.created_by)
                .map(|u| u.username)
                .unwrap_or_default(),
            id: s.id,
            employee_id: s.employee_id,
            valid_from: s.valid_from,
            amount: s.amount,
            created_on: s.created_on,
            created_by: s.created_by,
        }
    }
}

/// 422 unless `valid_from` is later than every other salary of the employee.
fn check_order(
    rows: &BTreeMap<i64, SalaryRecord>,
    employee_id: i64,
    valid_from: NaiveDate,
    except: Option<i64>,
) -> Result<(), AppError> {
    let latest = rows
        .values()
        .filter(|s| s.employee_id == employee_id && Some(s.id) != except)
        .map(|s| s.valid_from)
        .max();
    match latest {
        Some(latest) if valid_from <= latest => Err(AppError::Validation(format!(
            "valid_from must be later than {latest}"
        ))),
        _ => Ok(()),
    }
}

fn applied_conflict(id: i64, action: &str) -> AppError {
    AppError::Conflict(format!("salary {id} was already applied and cannot be {action}"))
}

/// GET /v1/salaries — List salaries.
#[utoipa::path(
    get,
    path = "/v1/salaries",
    params(Pagination),
    responses((status = 200, description = "Salaries", body = Vec<SalaryResponse>)),
    tag = "salaries"
)]
async fn list_salaries(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<SalaryResponse>>, AppError> {
    require_scope(&caller, &["salaries:read"])?;
    let page = pagination.page(state.salaries.list());
    Ok(Json(
        page.into_iter()
            .map(|s| SalaryResponse::build(&state, s))
            .collect(),
    ))
}

/// POST /v1/salaries — Register a salary.
#[utoipa::path(
    post,
    path = "/v1/salaries",
    request_body = CreateSalaryRequest,
    responses(
        (status = 201, description = "Salary created", body = SalaryResponse),
        (status = 422, description = "Invalid request", body = crate::error::ErrorBody),
    ),
    tag = "salaries"
)]
async fn create_salary(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreateSalaryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SalaryResponse>), AppError> {
    require_scope(&caller, &["salaries:write"])?;
    let req = extract_validated_json(body)?;
    if !state.employees.contains(req.employee_id) {
        return Err(AppError::Validation(format!(
            "employee {} does not exist",
            req.employee_id
        )));
    }

    let record = state.salaries.try_insert_with(|rows, id| {
        check_order(rows, req.employee_id, req.valid_from, None)?;
        Ok::<_, AppError>(SalaryRecord {
            id,
            employee_id: req.employee_id,
            valid_from: req.valid_from,
            amount: req.amount,
            created_on: Utc::now(),
            created_by: caller.user_id,
        })
    })?;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::compensation::save_salary(pool, &record).await {
            state.salaries.remove(record.id);
            return Err(persist_failed("salary", e));
        }
    }

    tracing::info!(
        salary_id = record.id,
        employee_id = record.employee_id,
        created_by = caller.user_id,
        "salary created"
    );
    Ok((StatusCode::CREATED, Json(SalaryResponse::build(&state, record))))
}

/// PUT /v1/salaries/:id — Edit a salary not yet applied.
#[utoipa::path(
    put,
    path = "/v1/salaries/{id}",
    params(("id" = i64, Path, description = "Salary ID")),
    request_body = UpdateSalaryRequest,
    responses(
        (status = 202, description = "Salary updated", body = SalaryResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Already applied", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid request", body = crate::error::ErrorBody),
    ),
    tag = "salaries"
)]
async fn update_salary(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<i64>,
    body: Result<Json<UpdateSalaryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SalaryResponse>), AppError> {
    require_scope(&caller, &["salaries:write"])?;
    let req = extract_validated_json(body)?;

    let _guard = state.payroll_lock.lock().await;
    if !state.salaries.contains(id) {
        return Err(not_found("salary", id));
    }
    if state.is_applied(LineKind::Salary, id) {
        return Err(applied_conflict(id, "edited"));
    }
    let (previous, record) = state
        .salaries
        .try_update(id, |rows, s| {
            check_order(rows, s.employee_id, req.valid_from, Some(id))?;
            let previous = s.clone();
            s.valid_from = req.valid_from;
            s.amount = req.amount;
            Ok::<_, AppError>((previous, s.clone()))
        })
        .ok_or_else(|| not_found("salary", id))??;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::compensation::save_salary(pool, &record).await {
            state.salaries.restore(id, previous);
            return Err(persist_failed("salary", e));
        }
    }

    tracing::info!(salary_id = id, updated_by = caller.user_id, "salary updated");
    Ok((StatusCode::ACCEPTED, Json(SalaryResponse::build(&state, record))))
}

/// DELETE /v1/salaries/:id — Delete a salary not yet applied.
#[utoipa::path(
    delete,
    path = "/v1/salaries/{id}",
    params(("id" = i64, Path, description = "Salary ID")),
    responses(
        (status = 204, description = "Salary deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Already applied", body = crate::error::ErrorBody),
    ),
    tag = "salaries"
)]
async fn delete_salary(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    require_scope(&caller, &["salaries:write"])?;

    let _guard = state.payroll_lock.lock().await;
    if !state.salaries.contains(id) {
        return Err(not_found("salary", id));
    }
    if state.is_applied(LineKind::Salary, id) {
        return Err(applied_conflict(id, "deleted"));
    }
    let removed = state.salaries.remove(id).ok_or_else(|| not_found("salary", id))?;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::compensation::delete_salary(pool, id).await {
            state.salaries.restore(id, removed);
            return Err(persist_failed("salary", e));
        }
    }

    tracing::info!(salary_id = id, "salary deleted");
    Ok(StatusCode::NO_CONTENT)
}
