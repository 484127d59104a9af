//! # Receipts API
//!
//! Read-only access to the per-employee receipts a disbursement produced.
//! Receipts are created and deleted only together with their disbursement.

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use nomina_core::{AccountKind, Money};
use nomina_payroll::LineKind;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{not_found, Pagination};
use crate::auth::{require_scope, CallerIdentity};
use crate::error::AppError;
use crate::state::{AppState, ReceiptLineRecord, ReceiptRecord};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/receipts", get(list_receipts))
        .route("/v1/receipts/:id", get(get_receipt))
        .route("/v1/receipts/employee/:id", get(list_employee_receipts))
        .route("/v1/receipts/disbursement/:id", get(list_disbursement_receipts))
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReceiptSummary {
    pub id: i64,
    pub disbursement_id: i64,
    pub employee_id: i64,
    pub employee: String,
    #[schema(value_type = String)]
    pub amount: Money,
    pub period_number: u32,
    pub period_date: NaiveDate,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub created_on: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReceiptLineResponse {
    /// `salary`, `adjustment`, `loan` or `payment`.
    #[schema(value_type = String)]
    pub kind: LineKind,
    pub source_id: i64,
    pub text: String,
    #[schema(value_type = String)]
    pub amount: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub account_kind: Option<AccountKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_kind_label: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReceiptWithLines {
    #[serde(flatten)]
    pub summary: ReceiptSummary,
    pub lines: Vec<ReceiptLineResponse>,
}

impl From<&ReceiptRecord> for ReceiptSummary {
    fn from(r: &ReceiptRecord) -> Self {
        Self {
            id: r.id,
            disbursement_id: r.disbursement_id,
            employee_id: r.employee_id,
            employee: r.employee_name.clone(),
            amount: r.amount,
            period_number: r.period_number,
            period_date: r.period_date,
            period_start: r.period_start,
            period_end: r.period_end,
            created_on: r.created_on,
        }
    }
}

impl From<ReceiptLineRecord> for ReceiptLineResponse {
    fn from(l: ReceiptLineRecord) -> Self {
        Self {
            kind: l.kind,
            source_id: l.source_id,
            text: l.text,
            amount: l.amount,
            bank: l.bank_name,
            account: l.account_number,
            account_kind_label: l.account_kind.map(|k| k.label().to_string()),
            account_kind: l.account_kind,
        }
    }
}

fn newest_first(mut receipts: Vec<ReceiptRecord>, pagination: &Pagination) -> Vec<ReceiptSummary> {
    receipts.sort_by(|a, b| (b.period_start, b.id).cmp(&(a.period_start, a.id)));
    pagination
        .page(receipts.iter())
        .into_iter()
        .map(ReceiptSummary::from)
        .collect()
}

/// GET /v1/receipts — All receipts, newest period first.
#[utoipa::path(
    get,
    path = "/v1/receipts",
    params(Pagination),
    responses((status = 200, description = "Receipts", body = Vec<ReceiptSummary>)),
    tag = "receipts"
)]
async fn list_receipts(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<ReceiptSummary>>, AppError> {
    require_scope(&caller, &["receipts:read"])?;
    Ok(Json(newest_first(state.receipts.list(), &pagination)))
}

/// GET /v1/receipts/:id — A receipt with its lines.
#[utoipa::path(
    get,
    path = "/v1/receipts/{id}",
    params(("id" = i64, Path, description = "Receipt ID")),
    responses(
        (status = 200, description = "Receipt", body = ReceiptWithLines),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "receipts"
)]
async fn get_receipt(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<i64>,
) -> Result<Json<ReceiptWithLines>, AppError> {
    require_scope(&caller, &["receipts:read"])?;
    let receipt = state.receipts.get(id).ok_or_else(|| not_found("receipt", id))?;
    Ok(Json(ReceiptWithLines {
        summary: ReceiptSummary::from(&receipt),
        lines: receipt.lines.into_iter().map(ReceiptLineResponse::from).collect(),
    }))
}

/// GET /v1/receipts/employee/:id — One employee's receipts.
#[utoipa::path(
    get,
    path = "/v1/receipts/employee/{id}",
    params(("id" = i64, Path, description = "Employee ID"), Pagination),
    responses(
        (status = 200, description = "Receipts", body = Vec<ReceiptSummary>),
        (status = 404, description = "Unknown employee", body = crate::error::ErrorBody),
    ),
    tag = "receipts"
)]
async fn list_employee_receipts(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<i64>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<ReceiptSummary>>, AppError> {
    require_scope(&caller, &["receipts:read"])?;
    if !state.employees.contains(id) {
        return Err(not_found("employee", id));
    }
    let receipts = state.receipts.filter(|r| r.employee_id == id);
    Ok(Json(newest_first(receipts, &pagination)))
}

/// GET /v1/receipts/disbursement/:id — Receipts of one disbursement.
#[utoipa::path(
    get,
    path = "/v1/receipts/disbursement/{id}",
    params(("id" = i64, Path, description = "Disbursement ID")),
    responses(
        (status = 200, description = "Receipts", body = Vec<ReceiptSummary>),
        (status = 404, description = "Unknown disbursement", body = crate::error::ErrorBody),
    ),
    tag = "receipts"
)]
async fn list_disbursement_receipts(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<i64>,
) -> Result<Json<Vec<ReceiptSummary>>, AppError> {
    require_scope(&caller, &["receipts:read"])?;
    if !state.disbursements.contains(id) {
        return Err(not_found("disbursement", id));
    }
    let receipts = state.receipts.filter(|r| r.disbursement_id == id);
    Ok(Json(receipts.iter().map(ReceiptSummary::from).collect()))
}
