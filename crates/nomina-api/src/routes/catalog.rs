//! # Catalog API
//!
//! Neighborhoods (colonias) and banks. Deactivating a bank deactivates
//! every account held at it; a bank with accounts cannot be deleted.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use super::{not_found, persist_failed, Pagination};
use crate::auth::{require_scope, CallerIdentity};
use crate::error::AppError;
use crate::extractors::{extract_validated_json, require_text, Validate};
use crate::state::{AppState, BankRecord, NeighborhoodRecord};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/neighborhoods", get(list_neighborhoods).post(create_neighborhood))
        .route("/v1/banks", get(list_banks).post(create_bank))
        .route("/v1/banks/:id", put(update_bank).delete(delete_bank))
}

// ── Neighborhoods ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateNeighborhoodRequest {
    pub name: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

impl Validate for CreateNeighborhoodRequest {
    fn validate(&self) -> Result<(), String> {
        require_text("name", &self.name, 100)?;
        require_text("city", &self.city, 100)?;
        require_text("state", &self.state, 100)?;
        let cp = self.postal_code.trim();
        if cp.len() != 5 || !cp.bytes().all(|b| b.is_ascii_digit()) {
            return Err("postal_code must be 5 digits".into());
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NeighborhoodQuery {
    /// Only neighborhoods with this postal code.
    pub postal_code: Option<String>,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
}

/// GET /v1/neighborhoods — List neighborhoods, optionally by postal code.
#[utoipa::path(
    get,
    path = "/v1/neighborhoods",
    params(NeighborhoodQuery),
    responses((status = 200, description = "Neighborhoods", body = Vec<NeighborhoodRecord>)),
    tag = "catalog"
)]
async fn list_neighborhoods(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(query): Query<NeighborhoodQuery>,
) -> Result<Json<Vec<NeighborhoodRecord>>, AppError> {
    require_scope(&caller, &["neighborhoods:read"])?;
    let postal_code = query.postal_code.as_deref().map(str::trim);
    let matching = state
        .neighborhoods
        .filter(|n| postal_code.map_or(true, |cp| n.postal_code == cp));
    let pagination = Pagination {
        skip: query.skip,
        limit: query.limit,
    };
    Ok(Json(pagination.page(matching)))
}

/// POST /v1/neighborhoods — Register a neighborhood.
#[utoipa::path(
    post,
    path = "/v1/neighborhoods",
    request_body = CreateNeighborhoodRequest,
    responses(
        (status = 201, description = "Neighborhood created", body = NeighborhoodRecord),
        (status = 422, description = "Invalid request", body = crate::error::ErrorBody),
    ),
    tag = "catalog"
)]
async fn create_neighborhood(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreateNeighborhoodRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<NeighborhoodRecord>), AppError> {
    require_scope(&caller, &["neighborhoods:write"])?;
    let req = extract_validated_json(body)?;

    let record = state.neighborhoods.insert_with(|id| NeighborhoodRecord {
        id,
        name: req.name.trim().to_string(),
        city: req.city.trim().to_string(),
        state: req.state.trim().to_string(),
        postal_code: req.postal_code.trim().to_string(),
    });

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::catalog::save_neighborhood(pool, &record).await {
            state.neighborhoods.remove(record.id);
            return Err(persist_failed("neighborhood", e));
        }
    }

    tracing::info!(neighborhood_id = record.id, "neighborhood created");
    Ok((StatusCode::CREATED, Json(record)))
}

// ── Banks ───────────────────────────────────────────────────────────

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BankRequest {
    pub name: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl Validate for BankRequest {
    fn validate(&self) -> Result<(), String> {
        require_text("name", &self.name, 100)
    }
}

fn bank_name_taken(
    rows: &std::collections::BTreeMap<i64, BankRecord>,
    name: &str,
    except: Option<i64>,
) -> bool {
    rows.values()
        .any(|b| Some(b.id) != except && b.name.to_lowercase() == name.to_lowercase())
}

/// GET /v1/banks — List banks.
#[utoipa::path(
    get,
    path = "/v1/banks",
    params(Pagination),
    responses((status = 200, description = "Banks", body = Vec<BankRecord>)),
    tag = "catalog"
)]
async fn list_banks(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<BankRecord>>, AppError> {
    require_scope(&caller, &["banks:read"])?;
    Ok(Json(pagination.page(state.banks.list())))
}

/// POST /v1/banks — Register a bank.
#[utoipa::path(
    post,
    path = "/v1/banks",
    request_body = BankRequest,
    responses(
        (status = 201, description = "Bank created", body = BankRecord),
        (status = 409, description = "Name taken", body = crate::error::ErrorBody),
    ),
    tag = "catalog"
)]
async fn create_bank(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<BankRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BankRecord>), AppError> {
    require_scope(&caller, &["banks:write"])?;
    let req = extract_validated_json(body)?;
    let name = req.name.trim().to_string();

    let record = state.banks.try_insert_with(|rows, id| {
        if bank_name_taken(rows, &name, None) {
            return Err(AppError::Conflict(format!("bank {name} already registered")));
        }
        Ok(BankRecord {
            id,
            name: name.clone(),
            active: req.active,
        })
    })?;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::catalog::save_bank(pool, &record).await {
            state.banks.remove(record.id);
            return Err(persist_failed("bank", e));
        }
    }

    tracing::info!(bank_id = record.id, "bank created");
    Ok((StatusCode::CREATED, Json(record)))
}

/// PUT /v1/banks/:id — Rename or (de)activate a bank.
#[utoipa::path(
    put,
    path = "/v1/banks/{id}",
    params(("id" = i64, Path, description = "Bank ID")),
    request_body = BankRequest,
    responses(
        (status = 202, description = "Bank updated", body = BankRecord),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Name taken", body = crate::error::ErrorBody),
    ),
    tag = "catalog"
)]
async fn update_bank(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<i64>,
    body: Result<Json<BankRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BankRecord>), AppError> {
    require_scope(&caller, &["banks:write"])?;
    let req = extract_validated_json(body)?;
    let name = req.name.trim().to_string();

    let _guard = state.payroll_lock.lock().await;
    let (previous, record) = state
        .banks
        .try_update(id, |rows, bank| {
            if bank_name_taken(rows, &name, Some(id)) {
                return Err(AppError::Conflict(format!("bank {name} already registered")));
            }
            let previous = bank.clone();
            bank.name = name.clone();
            bank.active = req.active;
            Ok((previous, bank.clone()))
        })
        .ok_or_else(|| not_found("bank", id))??;
    let deactivated = previous.active && !record.active;

    let touched = if deactivated {
        state.accounts.update_where(|a| {
            if a.bank_id == id && a.active {
                a.active = false;
                true
            } else {
                false
            }
        })
    } else {
        Vec::new()
    };

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::catalog::save_bank_with_accounts(pool, &record, &touched).await {
            state.banks.restore(id, previous);
            let touched_ids: Vec<i64> = touched.iter().map(|a| a.id).collect();
            state.accounts.update_where(|a| {
                let reactivate = touched_ids.contains(&a.id) && !a.active;
                if reactivate {
                    a.active = true;
                }
                reactivate
            });
            return Err(persist_failed("bank", e));
        }
    }

    tracing::info!(
        bank_id = id,
        accounts_deactivated = touched.len(),
        "bank updated"
    );
    Ok((StatusCode::ACCEPTED, Json(record)))
}

/// DELETE /v1/banks/:id — Delete a bank without accounts.
#[utoipa::path(
    delete,
    path = "/v1/banks/{id}",
    params(("id" = i64, Path, description = "Bank ID")),
    responses(
        (status = 204, description = "Bank deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Bank has accounts", body = crate::error::ErrorBody),
    ),
    tag = "catalog"
)]
async fn delete_bank(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    require_scope(&caller, &["banks:write"])?;

    let _guard = state.payroll_lock.lock().await;
    if !state.banks.contains(id) {
        return Err(not_found("bank", id));
    }
    if state.accounts.any(|a| a.bank_id == id) {
        return Err(AppError::Conflict("bank has registered accounts".into()));
    }
    let removed = state.banks.remove(id).ok_or_else(|| not_found("bank", id))?;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::catalog::delete_bank(pool, id).await {
            state.banks.restore(id, removed);
            return Err(persist_failed("bank", e));
        }
    }

    tracing::info!(bank_id = id, "bank deleted");
    Ok(StatusCode::NO_CONTENT)
}
