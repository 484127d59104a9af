//! # Adjustments API
//!
//! Signed amounts (positive perceptions, negative deductions) applied to
//! every period their `[start_date, end_date]` window overlaps.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use nomina_core::{Money, ValidityWindow};
use nomina_payroll::LineKind;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::loans::check_after_disbursed;
use super::{not_found, persist_failed, Pagination};
use crate::auth::{require_scope, CallerIdentity};
use crate::error::AppError;
use crate::extractors::{extract_validated_json, require_text, Validate};
use crate::state::{AdjustmentRecord, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/adjustments", get(list_adjustments).post(create_adjustment))
        .route("/v1/adjustments/:id", put(update_adjustment).delete(delete_adjustment))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAdjustmentRequest {
    pub employee_id: i64,
    pub start_date: NaiveDate,
    /// Inclusive. Open-ended when omitted.
    pub end_date: Option<NaiveDate>,
    pub reason: String,
    /// Signed. Negative amounts are deductions.
    #[schema(value_type = String, example = "-250.00")]
    pub amount: Money,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateAdjustmentRequest {
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub reason: String,
    #[schema(value_type = String, example = "-250.00")]
    pub amount: Money,
}

fn check_fields(
    start: NaiveDate,
    end: Option<NaiveDate>,
    reason: &str,
    amount: Money,
) -> Result<(), String> {
    require_text("reason", reason, 255)?;
    if amount.is_zero() {
        return Err("amount must not be zero".into());
    }
    ValidityWindow::new(start, end).map_err(|e| e.to_string())?;
    Ok(())
}

impl Validate for CreateAdjustmentRequest {
    fn validate(&self) -> Result<(), String> {
        check_fields(self.start_date, self.end_date, &self.reason, self.amount)
    }
}

impl Validate for UpdateAdjustmentRequest {
    fn validate(&self) -> Result<(), String> {
        check_fields(self.start_date, self.end_date, &self.reason, self.amount)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AdjustmentResponse {
    pub id: i64,
    pub employee_id: i64,
    pub employee: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub reason: String,
    #[schema(value_type = String)]
    pub amount: Money,
    pub created_on: DateTime<Utc>,
    pub created_by: i64,
    pub user: String,
}

impl AdjustmentResponse {
    fn build(state: &AppState, a: AdjustmentRecord) -> Self {
        Self {
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
            id: a.id,
            employee_id: a.employee_id,
            start_date: a.start_date,
            end_date: a.end_date,
            reason: a.reason,
            amount: a.amount,
            created_on: a.created_on,
            created_by: a.created_by,
        }
    }
}

/// GET /v1/adjustments — List adjustments.
#[utoipa::path(
    get,
    path = "/v1/adjustments",
    params(Pagination),
    responses((status = 200, description = "Adjustments", body = Vec<AdjustmentResponse>)),
    tag = "adjustments"
)]
async fn list_adjustments(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<AdjustmentResponse>>, AppError> {
    require_scope(&caller, &["adjustments:read"])?;
    let page = pagination.page(state.adjustments.list());
    Ok(Json(
        page.into_iter()
            .map(|a| AdjustmentResponse::build(&state, a))
            .collect(),
    ))
}

/// POST /v1/adjustments — Register an adjustment.
#[utoipa::path(
    post,
    path = "/v1/adjustments",
    request_body = CreateAdjustmentRequest,
    responses(
        (status = 201, description = "Adjustment created", body = AdjustmentResponse),
        (status = 422, description = "Invalid request", body = crate::error::ErrorBody),
    ),
    tag = "adjustments"
)]
async fn create_adjustment(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreateAdjustmentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AdjustmentResponse>), AppError> {
    require_scope(&caller, &["adjustments:write"])?;
    let req = extract_validated_json(body)?;
    if !state.employees.contains(req.employee_id) {
        return Err(AppError::Validation(format!(
            "employee {} does not exist",
            req.employee_id
        )));
    }

    let _guard = state.payroll_lock.lock().await;
    let record = {
        check_after_disbursed(&state, req.start_date)?;
        state.adjustments.insert_with(|id| AdjustmentRecord {
            id,
            employee_id: req.employee_id,
            start_date: req.start_date,
            end_date: req.end_date,
            reason: req.reason.trim().to_string(),
            amount: req.amount,
            created_on: Utc::now(),
            created_by: caller.user_id,
        })
    };

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::compensation::save_adjustment(pool, &record).await {
            state.adjustments.remove(record.id);
            return Err(persist_failed("adjustment", e));
        }
    }

    tracing::info!(
        adjustment_id = record.id,
        employee_id = record.employee_id,
        created_by = caller.user_id,
        "adjustment created"
    );
    Ok((StatusCode::CREATED, Json(AdjustmentResponse::build(&state, record))))
}

/// PUT /v1/adjustments/:id — Edit an adjustment.
///
/// Once applied, the start date is fixed and the end date cannot move
/// before the start of the last period the adjustment was applied in.
#[utoipa::path(
    put,
    path = "/v1/adjustments/{id}",
    params(("id" = i64, Path, description = "Adjustment ID")),
    request_body = UpdateAdjustmentRequest,
    responses(
        (status = 202, description = "Adjustment updated", body = AdjustmentResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Start date fixed by a receipt", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid request", body = crate::error::ErrorBody),
    ),
    tag = "adjustments"
)]
async fn update_adjustment(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<i64>,
    body: Result<Json<UpdateAdjustmentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AdjustmentResponse>), AppError> {
    require_scope(&caller, &["adjustments:write"])?;
    let req = extract_validated_json(body)?;

    let _guard = state.payroll_lock.lock().await;
    let (current, record) = {
        let current = state
            .adjustments
            .get(id)
            .ok_or_else(|| not_found("adjustment", id))?;

        match state.last_applied_period_start(LineKind::Adjustment, id) {
            Some(last_start) => {
                if req.start_date != current.start_date {
                    return Err(AppError::Conflict(format!(
                        "adjustment {id} was already applied and its start_date cannot change"
                    )));
                }
                if req.end_date.is_some_and(|end| end < last_start) {
                    return Err(AppError::Validation(format!(
                        "end_date cannot be earlier than {last_start}, the last period it was applied in"
                    )));
                }
            }
            None if req.start_date != current.start_date => {
                check_after_disbursed(&state, req.start_date)?;
            }
            None => {}
        }

        let record = state
            .adjustments
            .try_update(id, |_, a| {
                a.start_date = req.start_date;
                a.end_date = req.end_date;
                a.reason = req.reason.trim().to_string();
                a.amount = req.amount;
                Ok::<_, AppError>(a.clone())
            })
            .ok_or_else(|| not_found("adjustment", id))??;
        (current, record)
    };

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::compensation::save_adjustment(pool, &record).await {
            state.adjustments.restore(id, current);
            return Err(persist_failed("adjustment", e));
        }
    }

    tracing::info!(adjustment_id = id, updated_by = caller.user_id, "adjustment updated");
    Ok((StatusCode::ACCEPTED, Json(AdjustmentResponse::build(&state, record))))
}

/// DELETE /v1/adjustments/:id — Delete an adjustment never applied.
#[utoipa::path(
    delete,
    path = "/v1/adjustments/{id}",
    params(("id" = i64, Path, description = "Adjustment ID")),
    responses(
        (status = 204, description = "Adjustment deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Already applied", body = crate::error::ErrorBody),
    ),
    tag = "adjustments"
)]
async fn delete_adjustment(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    require_scope(&caller, &["adjustments:write"])?;

    let _guard = state.payroll_lock.lock().await;
    if !state.adjustments.contains(id) {
        return Err(not_found("adjustment", id));
    }
    if state.is_applied(LineKind::Adjustment, id) {
        return Err(AppError::Conflict(format!(
            "adjustment {id} was already applied and cannot be deleted"
        )));
    }
    let removed = state
        .adjustments
        .remove(id)
        .ok_or_else(|| not_found("adjustment", id))?;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::compensation::delete_adjustment(pool, id).await {
            state.adjustments.restore(id, removed);
            return Err(persist_failed("adjustment", e));
        }
    }

    tracing::info!(adjustment_id = id, "adjustment deleted");
    Ok(StatusCode::NO_CONTENT)
}
