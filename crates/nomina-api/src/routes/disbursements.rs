//! # Disbursements API
//!
//! A disbursement is one payroll run over a semi-monthly period. Creating
//! one computes a [`DisbursementPlan`] from a snapshot of the stores; with
//! `dry_run` (the default) the plan is only previewed. Otherwise the run,
//! its per-account details and one receipt per paid employee are stored.
//!
//! Runs are serialized through [`AppState::payroll_lock`]. The duplicate
//! check, the snapshot, the insertion and the database write all happen
//! under the lock, so two runs cannot interleave. Only the latest run can
//! be deleted, which releases the salaries, loans, adjustments and accounts
//! its receipts referenced.

use std::collections::BTreeMap;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use nomina_core::{AccountKind, Money, PayPeriod};
use nomina_payroll::{AccountFact, DisbursementPlan, LineKind};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::{not_found, persist_failed, Pagination};
use crate::auth::{require_scope, CallerIdentity};
use crate::error::AppError;
use crate::extractors::{extract_json, extract_query};
use crate::state::{
    AppState, DetailRecord, DisbursementRecord, ReceiptLineRecord, ReceiptRecord,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/disbursements", get(list_disbursements).post(create_disbursement))
        .route("/v1/disbursements/:id", get(get_disbursement).delete(delete_disbursement))
}

// ── DTOs ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateDisbursementRequest {
    /// Quincena number, 1..=24.
    pub period: u32,
    /// Any date inside the period.
    pub period_date: NaiveDate,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DryRunQuery {
    /// Preview only (default: true).
    pub dry_run: Option<bool>,
}

/// A computed plan. `id` is set once stored.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PlanResponse {
    pub id: Option<i64>,
    pub dry_run: bool,
    #[schema(value_type = Object)]
    pub plan: DisbursementPlan,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DisbursementSummary {
    pub id: i64,
    pub period_number: u32,
    pub period_date: NaiveDate,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    #[schema(value_type = String)]
    pub total: Money,
    pub digest: String,
    pub created_on: DateTime<Utc>,
    pub created_by: i64,
    pub user: String,
}

/// One account payment, flattened for display.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DetailResponse {
    pub account_id: i64,
    pub employee_id: i64,
    pub employee: String,
    pub bank: String,
    pub account: String,
    #[schema(value_type = String)]
    pub kind: AccountKind,
    pub kind_label: String,
    #[schema(value_type = String)]
    pub amount: Money,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DisbursementWithDetails {
    #[serde(flatten)]
    pub summary: DisbursementSummary,
    pub details: Vec<DetailResponse>,
}

impl DisbursementSummary {
    fn build(state: &AppState, d: &DisbursementRecord) -> Self {
        Self {
            id: d.id,
            period_number: d.period_number,
            period_date: d.period_date,
            period_start: d.period_start,
            period_end: d.period_end,
            total: d.total,
            digest: d.digest.clone(),
            created_on: d.created_on,
            created_by: d.created_by,
            user: state
                .users
                .get(d.created_by)
                .map(|u| u.username)
                .unwrap_or_default(),
        }
    }
}

impl From<DetailRecord> for DetailResponse {
    fn from(d: DetailRecord) -> Self {
        Self {
            account_id: d.account_id,
            employee_id: d.employee_id,
            employee: d.employee_name,
            bank: d.bank_name,
            account: d.account_number,
            kind: d.account_kind,
            kind_label: d.account_kind.label().to_string(),
            amount: d.amount,
        }
    }
}

// ── Plan materialization ────────────────────────────────────────────

/// Turn a plan into a stored disbursement and its receipts.
///
/// Must run under the payroll lock. Ids are allocated from the stores.
fn store_plan(
    state: &AppState,
    plan: &DisbursementPlan,
    accounts: &BTreeMap<i64, AccountFact>,
    created_by: i64,
) -> Result<(DisbursementRecord, Vec<ReceiptRecord>), AppError> {
    let now = Utc::now();
    let period = plan.period;
    let account = |id: i64| {
        accounts
            .get(&id)
            .ok_or_else(|| AppError::Internal(format!("planned account {id} missing from snapshot")))
    };
    let names: BTreeMap<i64, &str> = plan
        .receipts
        .iter()
        .map(|r| (r.employee_id, r.employee_name.as_str()))
        .collect();

    let details = plan
        .details
        .iter()
        .map(|d| {
            let acct = account(d.account_id)?;
            Ok(DetailRecord {
                account_id: d.account_id,
                employee_id: d.employee_id,
                employee_name: names.get(&d.employee_id).copied().unwrap_or_default().to_string(),
                bank_name: acct.bank_name.clone(),
                account_number: acct.number.clone(),
                account_kind: acct.kind,
                amount: d.amount,
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    let receipt_lines = plan
        .receipts
        .iter()
        .map(|r| {
            r.lines
                .iter()
                .map(|l| {
                    let payment = match l.kind {
                        LineKind::Payment => Some(account(l.source_id)?),
                        _ => None,
                    };
                    Ok(ReceiptLineRecord {
                        kind: l.kind,
                        source_id: l.source_id,
                        text: l.text.clone(),
                        amount: l.amount,
                        bank_name: payment.map(|a| a.bank_name.clone()),
                        account_number: payment.map(|a| a.number.clone()),
                        account_kind: payment.map(|a| a.kind),
                    })
                })
                .collect::<Result<Vec<_>, AppError>>()
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    let disbursement = state.disbursements.insert_with(|id| DisbursementRecord {
        id,
        period_number: period.number(),
        period_date: period.date(),
        period_start: period.start(),
        period_end: period.end(),
        total: plan.total,
        digest: plan.digest.clone(),
        created_on: now,
        created_by,
        details,
    });

    let receipts = plan
        .receipts
        .iter()
        .zip(receipt_lines)
        .map(|(r, lines)| {
            state.receipts.insert_with(|id| ReceiptRecord {
                id,
                disbursement_id: disbursement.id,
                employee_id: r.employee_id,
                employee_name: r.employee_name.clone(),
                amount: r.net,
                period_number: period.number(),
                period_date: period.date(),
                period_start: period.start(),
                period_end: period.end(),
                created_on: now,
                lines,
            })
        })
        .collect();

    Ok((disbursement, receipts))
}

/// What a create request resolved to.
enum Outcome {
    Preview(DisbursementPlan),
    Stored(DisbursementPlan, DisbursementRecord, Vec<ReceiptRecord>),
}

/// Callers must hold [`AppState::payroll_lock`].
fn plan_or_store(
    state: &AppState,
    period: PayPeriod,
    dry_run: bool,
    created_by: i64,
) -> Result<Outcome, AppError> {
    if state
        .disbursements
        .any(|d| d.period_start == period.start())
    {
        return Err(AppError::Conflict(format!(
            "a disbursement for period {} of {} already exists",
            period.number(),
            period.year()
        )));
    }
    if let Some(end) = state.disbursed_through() {
        if period.date() <= end {
            return Err(AppError::Validation(format!(
                "period_date must be after {end}, the end of the latest disbursed period"
            )));
        }
    }

    let snapshot = state.payroll_snapshot()?;
    let plan = nomina_payroll::compute(&snapshot, &period)?;
    if dry_run {
        return Ok(Outcome::Preview(plan));
    }
    if plan.is_empty() {
        return Err(AppError::Validation("no payable employees".into()));
    }

    let accounts: BTreeMap<i64, AccountFact> = snapshot
        .accounts
        .into_iter()
        .map(|a| (a.id, a))
        .collect();
    let (disbursement, receipts) = store_plan(state, &plan, &accounts, created_by)?;
    Ok(Outcome::Stored(plan, disbursement, receipts))
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET /v1/disbursements — List disbursements, newest first.
#[utoipa::path(
    get,
    path = "/v1/disbursements",
    params(Pagination),
    responses((status = 200, description = "Disbursements", body = Vec<DisbursementSummary>)),
    tag = "disbursements"
)]
async fn list_disbursements(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<DisbursementSummary>>, AppError> {
    require_scope(&caller, &["disbursements:read"])?;
    let page = pagination.page(state.disbursements.list().into_iter().rev());
    Ok(Json(
        page.iter()
            .map(|d| DisbursementSummary::build(&state, d))
            .collect(),
    ))
}

/// GET /v1/disbursements/:id — A disbursement with its account details.
#[utoipa::path(
    get,
    path = "/v1/disbursements/{id}",
    params(("id" = i64, Path, description = "Disbursement ID")),
    responses(
        (status = 200, description = "Disbursement", body = DisbursementWithDetails),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "disbursements"
)]
async fn get_disbursement(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<i64>,
) -> Result<Json<DisbursementWithDetails>, AppError> {
    require_scope(&caller, &["disbursements:read"])?;
    let d = state
        .disbursements
        .get(id)
        .ok_or_else(|| not_found("disbursement", id))?;
    Ok(Json(DisbursementWithDetails {
        summary: DisbursementSummary::build(&state, &d),
        details: d.details.into_iter().map(DetailResponse::from).collect(),
    }))
}

/// POST /v1/disbursements — Preview or run payroll for a period.
#[utoipa::path(
    post,
    path = "/v1/disbursements",
    params(DryRunQuery),
    request_body = CreateDisbursementRequest,
    responses(
        (status = 200, description = "Plan preview", body = PlanResponse),
        (status = 201, description = "Disbursement stored", body = PlanResponse),
        (status = 409, description = "Period already disbursed", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid period or nothing to pay", body = crate::error::ErrorBody),
    ),
    tag = "disbursements"
)]
async fn create_disbursement(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<DryRunQuery>, QueryRejection>,
    body: Result<Json<CreateDisbursementRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PlanResponse>), AppError> {
    require_scope(&caller, &["disbursements:write"])?;
    let dry_run = extract_query(query)?.dry_run.unwrap_or(true);
    let req = extract_json(body)?;
    let period = PayPeriod::new(req.period, req.period_date)?;

    let _guard = state.payroll_lock.lock().await;
    match plan_or_store(&state, period, dry_run, caller.user_id)? {
        Outcome::Preview(plan) => {
            tracing::info!(
                period = %plan.period,
                receipts = plan.receipts.len(),
                omissions = plan.omissions.len(),
                total = %plan.total,
                "disbursement previewed"
            );
            Ok((
                StatusCode::OK,
                Json(PlanResponse {
                    id: None,
                    dry_run: true,
                    plan,
                }),
            ))
        }
        Outcome::Stored(plan, disbursement, receipts) => {
            if let Some(pool) = &state.db_pool {
                if let Err(e) = crate::db::disbursements::insert(pool, &disbursement, &receipts).await {
                    state.disbursements.remove(disbursement.id);
                    state
                        .receipts
                        .remove_where(|r| r.disbursement_id == disbursement.id);
                    return Err(persist_failed("disbursement", e));
                }
            }

            tracing::info!(
                disbursement_id = disbursement.id,
                period = %plan.period,
                receipts = receipts.len(),
                total = %plan.total,
                digest = %plan.digest,
                created_by = caller.user_id,
                "disbursement stored"
            );
            Ok((
                StatusCode::CREATED,
                Json(PlanResponse {
                    id: Some(disbursement.id),
                    dry_run: false,
                    plan,
                }),
            ))
        }
    }
}

/// DELETE /v1/disbursements/:id — Delete the latest disbursement.
#[utoipa::path(
    delete,
    path = "/v1/disbursements/{id}",
    params(("id" = i64, Path, description = "Disbursement ID")),
    responses(
        (status = 204, description = "Disbursement and its receipts deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Not the latest disbursement", body = crate::error::ErrorBody),
    ),
    tag = "disbursements"
)]
async fn delete_disbursement(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    require_scope(&caller, &["disbursements:delete"])?;

    let _guard = state.payroll_lock.lock().await;
    let disbursement = state
        .disbursements
        .get(id)
        .ok_or_else(|| not_found("disbursement", id))?;
    if state.latest_disbursement().map(|d| d.id) != Some(id) {
        return Err(AppError::Conflict(
            "only the latest disbursement can be deleted".into(),
        ));
    }
    state.disbursements.remove(id);
    let receipts = state.receipts.remove_where(|r| r.disbursement_id == id);

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::disbursements::delete(pool, id).await {
            state.disbursements.restore(disbursement.id, disbursement);
            for receipt in receipts {
                state.receipts.restore(receipt.id, receipt);
            }
            return Err(persist_failed("disbursement", e));
        }
    }

    tracing::info!(
        disbursement_id = id,
        receipts = receipts.len(),
        "disbursement deleted"
    );
    Ok(StatusCode::NO_CONTENT)
}
