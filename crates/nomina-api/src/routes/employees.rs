//! # Employees API
//!
//! Employee records. RFC and CURP are validated and unique across
//! employees; responses embed the neighborhood.

use std::collections::BTreeMap;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use nomina_core::{Curp, Rfc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{not_found, persist_failed, Pagination};
use crate::auth::{require_scope, CallerIdentity};
use crate::error::AppError;
use crate::extractors::{extract_validated_json, require_text, Validate};
use crate::state::{AppState, EmployeeRecord, NeighborhoodRecord};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/employees", get(list_employees).post(create_employee))
        .route("/v1/employees/:id", get(get_employee).put(update_employee))
}

fn default_active() -> bool {
    true
}

/// Create and edit request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct EmployeeRequest {
    pub name: String,
    pub paternal_surname: String,
    #[serde(default)]
    pub maternal_surname: String,
    pub rfc: String,
    pub curp: String,
    pub street: String,
    pub exterior_number: String,
    pub interior_number: Option<String>,
    pub neighborhood_id: i64,
    pub phone: Option<String>,
    pub mobile: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl Validate for EmployeeRequest {
    fn validate(&self) -> Result<(), String> {
        require_text("name", &self.name, 100)?;
        require_text("paternal_surname", &self.paternal_surname, 100)?;
        require_text("street", &self.street, 200)?;
        require_text("exterior_number", &self.exterior_number, 20)?;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EmployeeResponse {
    pub id: i64,
    pub name: String,
    pub paternal_surname: String,
    pub maternal_surname: String,
    pub full_name: String,
    #[schema(value_type = String)]
    pub rfc: Rfc,
    #[schema(value_type = String)]
    pub curp: Curp,
    pub street: String,
    pub exterior_number: String,
    pub interior_number: Option<String>,
    pub neighborhood_id: i64,
    pub neighborhood: Option<NeighborhoodRecord>,
    pub phone: Option<String>,
    pub mobile: Option<String>,
    pub active: bool,
    pub created_on: DateTime<Utc>,
}

impl EmployeeResponse {
    fn build(state: &AppState, e: EmployeeRecord) -> Self {
        Self {
            neighborhood: state.neighborhoods.get(e.neighborhood_id),
            full_name: e.full_name(),
            id: e.id,
            name: e.name,
            paternal_surname: e.paternal_surname,
            maternal_surname: e.maternal_surname,
            rfc: e.rfc,
            curp: e.curp,
            street: e.street,
            exterior_number: e.exterior_number,
            interior_number: e.interior_number,
            neighborhood_id: e.neighborhood_id,
            phone: e.phone,
            mobile: e.mobile,
            active: e.active,
            created_on: e.created_on,
        }
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parsed identifiers, or a 422.
fn identifiers(req: &EmployeeRequest) -> Result<(Rfc, Curp), AppError> {
    Ok((Rfc::new(req.rfc.as_str())?, Curp::new(req.curp.as_str())?))
}

/// 409 if another employee already holds the RFC or CURP.
fn check_unique(
    rows: &BTreeMap<i64, EmployeeRecord>,
    rfc: &Rfc,
    curp: &Curp,
    except: Option<i64>,
) -> Result<(), AppError> {
    let others = || rows.values().filter(|e| Some(e.id) != except);
    if others().any(|e| &e.rfc == rfc) {
        return Err(AppError::Conflict("RFC already registered".into()));
    }
    if others().any(|e| &e.curp == curp) {
        return Err(AppError::Conflict("CURP already registered".into()));
    }
    Ok(())
}

fn require_neighborhood(state: &AppState, id: i64) -> Result<(), AppError> {
    if state.neighborhoods.contains(id) {
        Ok(())
    } else {
        Err(AppError::Validation(format!("neighborhood {id} does not exist")))
    }
}

/// GET /v1/employees — List employees.
#[utoipa::path(
    get,
    path = "/v1/employees",
    params(Pagination),
    responses((status = 200, description = "Employees", body = Vec<EmployeeResponse>)),
    tag = "employees"
)]
async fn list_employees(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<EmployeeResponse>>, AppError> {
    require_scope(&caller, &["employees:read"])?;
    let page = pagination.page(state.employees.list());
    Ok(Json(
        page.into_iter()
            .map(|e| EmployeeResponse::build(&state, e))
            .collect(),
    ))
}

/// GET /v1/employees/:id — Get an employee.
#[utoipa::path(
    get,
    path = "/v1/employees/{id}",
    params(("id" = i64, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Employee", body = EmployeeResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "employees"
)]
async fn get_employee(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<i64>,
) -> Result<Json<EmployeeResponse>, AppError> {
    require_scope(&caller, &["employees:read"])?;
    let employee = state.employees.get(id).ok_or_else(|| not_found("employee", id))?;
    Ok(Json(EmployeeResponse::build(&state, employee)))
}

/// POST /v1/employees — Register an employee.
#[utoipa::path(
    post,
    path = "/v1/employees",
    request_body = EmployeeRequest,
    responses(
        (status = 201, description = "Employee created", body = EmployeeResponse),
        (status = 409, description = "RFC or CURP already registered", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid request", body = crate::error::ErrorBody),
    ),
    tag = "employees"
)]
async fn create_employee(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<EmployeeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<EmployeeResponse>), AppError> {
    require_scope(&caller, &["employees:write"])?;
    let req = extract_validated_json(body)?;
    let (rfc, curp) = identifiers(&req)?;
    require_neighborhood(&state, req.neighborhood_id)?;

    let record = state.employees.try_insert_with(|rows, id| {
        check_unique(rows, &rfc, &curp, None)?;
        Ok::<_, AppError>(EmployeeRecord {
            id,
            name: req.name.trim().to_string(),
            paternal_surname: req.paternal_surname.trim().to_string(),
            maternal_surname: req.maternal_surname.trim().to_string(),
            rfc: rfc.clone(),
            curp: curp.clone(),
            street: req.street.trim().to_string(),
            exterior_number: req.exterior_number.trim().to_string(),
            interior_number: trimmed(req.interior_number),
            neighborhood_id: req.neighborhood_id,
            phone: trimmed(req.phone),
            mobile: trimmed(req.mobile),
            active: req.active,
            created_on: Utc::now(),
        })
    })?;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::staff::save_employee(pool, &record).await {
            state.employees.remove(record.id);
            return Err(persist_failed("employee", e));
        }
    }

    tracing::info!(employee_id = record.id, created_by = caller.user_id, "employee created");
    Ok((StatusCode::CREATED, Json(EmployeeResponse::build(&state, record))))
}

/// PUT /v1/employees/:id — Edit an employee.
#[utoipa::path(
    put,
    path = "/v1/employees/{id}",
    params(("id" = i64, Path, description = "Employee ID")),
    request_body = EmployeeRequest,
    responses(
        (status = 202, description = "Employee updated", body = EmployeeResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "RFC or CURP already registered", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid request", body = crate::error::ErrorBody),
    ),
    tag = "employees"
)]
async fn update_employee(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<i64>,
    body: Result<Json<EmployeeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<EmployeeResponse>), AppError> {
    require_scope(&caller, &["employees:write"])?;
    let req = extract_validated_json(body)?;
    if !state.employees.contains(id) {
        return Err(not_found("employee", id));
    }
    let (rfc, curp) = identifiers(&req)?;
    require_neighborhood(&state, req.neighborhood_id)?;

    let _guard = state.payroll_lock.lock().await;
    let (previous, record) = state
        .employees
        .try_update(id, |rows, e| {
            check_unique(rows, &rfc, &curp, Some(id))?;
            let previous = e.clone();
            e.name = req.name.trim().to_string();
            e.paternal_surname = req.paternal_surname.trim().to_string();
            e.maternal_surname = req.maternal_surname.trim().to_string();
            e.rfc = rfc.clone();
            e.curp = curp.clone();
            e.street = req.street.trim().to_string();
            e.exterior_number = req.exterior_number.trim().to_string();
            e.interior_number = trimmed(req.interior_number);
            e.neighborhood_id = req.neighborhood_id;
            e.phone = trimmed(req.phone);
            e.mobile = trimmed(req.mobile);
            e.active = req.active;
            Ok::<_, AppError>((previous, e.clone()))
        })
        .ok_or_else(|| not_found("employee", id))??;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::staff::save_employee(pool, &record).await {
            state.employees.restore(id, previous);
            return Err(persist_failed("employee", e));
        }
    }

    tracing::info!(employee_id = id, updated_by = caller.user_id, "employee updated");
    Ok((StatusCode::ACCEPTED, Json(EmployeeResponse::build(&state, record))))
}
