//! # Loans API
//!
//! Loans are repaid through per-period installments deducted by each
//! disbursement. A loan must start after the latest disbursed period; once
//! an installment was deducted its start date is fixed and the total can't
//! drop below what was already repaid.

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
use crate::state::{AppState, LoanRecord};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/loans", get(list_loans).post(create_loan))
        .route("/v1/loans/:id", put(update_loan).delete(delete_loan))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateLoanRequest {
    pub employee_id: i64,
    pub start_date: NaiveDate,
    /// Total lent.
    #[schema(value_type = String, example = "5000.00")]
    pub amount: Money,
    /// Deducted each period.
    #[schema(value_type = String, example = "500.00")]
    pub installment: Money,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateLoanRequest {
    pub start_date: NaiveDate,
    #[schema(value_type = String, example = "5000.00")]
    pub amount: Money,
    #[schema(value_type = String, example = "500.00")]
    pub installment: Money,
    pub comment: Option<String>,
}

fn check_amounts(amount: Money, installment: Money, comment: Option<&str>) -> Result<(), String> {
    if !amount.is_positive() {
        return Err("amount must be greater than zero".into());
    }
    if !installment.is_positive() {
        return Err("installment must be greater than zero".into());
    }
    if installment > amount {
        return Err("installment cannot exceed the loan amount".into());
    }
    if comment.is_some_and(|c| c.chars().count() > 255) {
        return Err("comment must not exceed 255 characters".into());
    }
    Ok(())
}

impl Validate for CreateLoanRequest {
    fn validate(&self) -> Result<(), String> {
        check_amounts(self.amount, self.installment, self.comment.as_deref())
    }
}

impl Validate for UpdateLoanRequest {
    fn validate(&self) -> Result<(), String> {
        check_amounts(self.amount, self.installment, self.comment.as_deref())
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoanResponse {
    pub id: i64,
    pub employee_id: i64,
    pub employee: String,
    pub start_date: NaiveDate,
    #[schema(value_type = String)]
    pub amount: Money,
    #[schema(value_type = String)]
    pub installment: Money,
    /// Sum of installments already deducted.
    #[schema(value_type = String)]
    pub repaid: Money,
    #[schema(value_type = String)]
    pub outstanding: Money,
    pub comment: Option<String>,
    pub created_on: DateTime<Utc>,
    pub created_by: i64,
    pub user: String,
}

impl LoanResponse {
    fn build(state: &AppState, l: LoanRecord, repaid: Money) -> Result<Self, AppError> {
        let outstanding = l
            .amount
            .checked_sub(repaid)
            .ok_or_else(|| AppError::Internal(format!("loan {} balance overflow", l.id)))?;
        Ok(Self {
            employee: state
                .employees
                .get(l.employee_id)
                .map(|e| e.full_name())
                .unwrap_or_default(),
            user: state
                .users
                .get(l.created_by)
                .map(|u| u.username)
                .unwrap_or_default(),
            id: l.id,
            employee_id: l.employee_id,
            start_date: l.start_date,
            amount: l.amount,
            installment: l.installment,
            repaid,
            outstanding,
            comment: l.comment,
            created_on: l.created_on,
            created_by: l.created_by,
        })
    }
}

fn clean_comment(comment: Option<String>) -> Option<String> {
    comment
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

/// 422 unless `start` falls after the latest disbursed period.
pub(crate) fn check_after_disbursed(state: &AppState, start: NaiveDate) -> Result<(), AppError> {
    match state.disbursed_through() {
        Some(end) if start <= end => Err(AppError::Validation(format!(
            "start_date must be after {end}, the end of the latest disbursed period"
        ))),
        _ => Ok(()),
    }
}

/// GET /v1/loans — List loans with their balances.
#[utoipa::path(
    get,
    path = "/v1/loans",
    params(Pagination),
    responses((status = 200, description = "Loans", body = Vec<LoanResponse>)),
    tag = "loans"
)]
async fn list_loans(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<LoanResponse>>, AppError> {
    require_scope(&caller, &["loans:read"])?;
    let repaid = state.loan_repayments()?;
    let page = pagination.page(state.loans.list());
    let loans = page
        .into_iter()
        .map(|l| {
            let paid = repaid.get(&l.id).copied().unwrap_or_default();
            LoanResponse::build(&state, l, paid)
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(loans))
}

/// POST /v1/loans — Register a loan.
#[utoipa::path(
    post,
    path = "/v1/loans",
    request_body = CreateLoanRequest,
    responses(
        (status = 201, description = "Loan created", body = LoanResponse),
        (status = 422, description = "Invalid request", body = crate::error::ErrorBody),
    ),
    tag = "loans"
)]
async fn create_loan(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreateLoanRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<LoanResponse>), AppError> {
    require_scope(&caller, &["loans:write"])?;
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
        state.loans.insert_with(|id| LoanRecord {
            id,
            employee_id: req.employee_id,
            start_date: req.start_date,
            amount: req.amount,
            installment: req.installment,
            comment: clean_comment(req.comment),
            created_on: Utc::now(),
            created_by: caller.user_id,
        })
    };

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::compensation::save_loan(pool, &record).await {
            state.loans.remove(record.id);
            return Err(persist_failed("loan", e));
        }
    }

    tracing::info!(
        loan_id = record.id,
        employee_id = record.employee_id,
        created_by = caller.user_id,
        "loan created"
    );
    let response = LoanResponse::build(&state, record, Money::ZERO)?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// PUT /v1/loans/:id — Edit a loan.
#[utoipa::path(
    put,
    path = "/v1/loans/{id}",
    params(("id" = i64, Path, description = "Loan ID")),
    request_body = UpdateLoanRequest,
    responses(
        (status = 202, description = "Loan updated", body = LoanResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Start date fixed by a deduction", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid request", body = crate::error::ErrorBody),
    ),
    tag = "loans"
)]
async fn update_loan(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<i64>,
    body: Result<Json<UpdateLoanRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<LoanResponse>), AppError> {
    require_scope(&caller, &["loans:write"])?;
    let req = extract_validated_json(body)?;

    let _guard = state.payroll_lock.lock().await;
    let (current, record, repaid) = {
        let current = state.loans.get(id).ok_or_else(|| not_found("loan", id))?;
        let applied = state.is_applied(LineKind::Loan, id);
        let repaid = state.loan_repaid(id)?;

        if applied {
            if req.start_date != current.start_date {
                return Err(AppError::Conflict(format!(
                    "loan {id} was already applied and its start_date cannot change"
                )));
            }
        } else if req.start_date != current.start_date {
            check_after_disbursed(&state, req.start_date)?;
        }
        if req.amount < repaid {
            return Err(AppError::Validation(format!(
                "amount cannot be less than the {repaid} already repaid"
            )));
        }

        let record = state
            .loans
            .try_update(id, |_, l| {
                l.start_date = req.start_date;
                l.amount = req.amount;
                l.installment = req.installment;
                l.comment = clean_comment(req.comment);
                Ok::<_, AppError>(l.clone())
            })
            .ok_or_else(|| not_found("loan", id))??;
        (current, record, repaid)
    };

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::compensation::save_loan(pool, &record).await {
            state.loans.restore(id, current);
            return Err(persist_failed("loan", e));
        }
    }

    tracing::info!(loan_id = id, updated_by = caller.user_id, "loan updated");
    let response = LoanResponse::build(&state, record, repaid)?;
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// DELETE /v1/loans/:id — Delete a loan with no deductions.
#[utoipa::path(
    delete,
    path = "/v1/loans/{id}",
    params(("id" = i64, Path, description = "Loan ID")),
    responses(
        (status = 204, description = "Loan deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Already applied", body = crate::error::ErrorBody),
    ),
    tag = "loans"
)]
async fn delete_loan(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    require_scope(&caller, &["loans:write"])?;

    let _guard = state.payroll_lock.lock().await;
    if !state.loans.contains(id) {
        return Err(not_found("loan", id));
    }
    if state.is_applied(LineKind::Loan, id) {
        return Err(AppError::Conflict(format!(
            "loan {id} was already applied and cannot be deleted"
        )));
    }
    let removed = state.loans.remove(id).ok_or_else(|| not_found("loan", id))?;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::compensation::delete_loan(pool, id).await {
            state.loans.restore(id, removed);
            return Err(persist_failed("loan", e));
        }
    }

    tracing::info!(loan_id = id, "loan deleted");
    Ok(StatusCode::NO_CONTENT)
}
