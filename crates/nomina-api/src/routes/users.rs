//! # Users & Tokens
//!
//! `POST /v1/users/token` issues bearer tokens from form-encoded
//! credentials. The remaining routes administer users.

use axum::extract::rejection::{FormRejection, JsonRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Form, Json, Router};
use chrono::Utc;
use nomina_core::Scope;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{blocking, not_found, persist_failed, Pagination};
use crate::auth::{self, require_scope, CallerIdentity, Claims};
use crate::error::AppError;
use crate::extractors::{extract_form, extract_validated_json, require_text, Validate};
use crate::state::{AppState, UserRecord};

/// Routes that need a bearer token.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/users", get(list_users).post(create_user))
        .route("/v1/users/me", get(me))
        .route("/v1/users/:id", put(update_user))
}

/// The token route, mounted outside the auth middleware.
pub fn token_router() -> Router<AppState> {
    Router::new().route("/v1/users/token", post(issue_token))
}

// ── DTOs ────────────────────────────────────────────────────────────

/// OAuth2 password grant form.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TokenForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub username: String,
    pub name: String,
    pub password: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

/// Edit request. The password is kept when omitted.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub username: String,
    pub name: String,
    pub password: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn validate_user_fields(username: &str, name: &str, scopes: &[String]) -> Result<(), String> {
    require_text("username", username, 50)?;
    require_text("name", name, 100)?;
    for scope in scopes {
        Scope::new(scope.as_str()).map_err(|e| e.to_string())?;
    }
    Ok(())
}

impl Validate for CreateUserRequest {
    fn validate(&self) -> Result<(), String> {
        validate_user_fields(&self.username, &self.name, &self.scopes)?;
        if self.password.is_empty() {
            return Err("password must not be empty".into());
        }
        Ok(())
    }
}

impl Validate for UpdateUserRequest {
    fn validate(&self) -> Result<(), String> {
        validate_user_fields(&self.username, &self.name, &self.scopes)?;
        if self.password.as_deref() == Some("") {
            return Err("password must not be empty".into());
        }
        Ok(())
    }
}

/// A user as returned by the API. The password hash is never included.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub scopes: Vec<String>,
    pub active: bool,
}

impl From<UserRecord> for UserResponse {
    fn from(u: UserRecord) -> Self {
        Self {
            id: u.id,
            username: u.username,
            name: u.name,
            scopes: u.scopes,
            active: u.active,
        }
    }
}

/// Usernames compare trimmed and ignoring ASCII case.
fn same_username(stored: &str, given: &str) -> bool {
    stored.trim().eq_ignore_ascii_case(given.trim())
}

fn username_taken(rows: &std::collections::BTreeMap<i64, UserRecord>, username: &str, except: Option<i64>) -> bool {
    rows.values()
        .any(|u| Some(u.id) != except && same_username(&u.username, username))
}

// ── Handlers ────────────────────────────────────────────────────────

/// POST /v1/users/token — Exchange credentials for a bearer token.
#[utoipa::path(
    post,
    path = "/v1/users/token",
    request_body(content = TokenForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 401, description = "Bad credentials", body = crate::error::ErrorBody),
        (status = 422, description = "Missing fields", body = crate::error::ErrorBody),
    ),
    tag = "users"
)]
async fn issue_token(
    State(state): State<AppState>,
    form: Result<Form<TokenForm>, FormRejection>,
) -> Result<Json<TokenResponse>, AppError> {
    let form = extract_form(form)?;
    let rejected = || AppError::Unauthorized("invalid username or password".into());

    let user = state
        .users
        .filter(|u| same_username(&u.username, &form.username))
        .into_iter()
        .next();
    let Some(user) = user else {
        tracing::warn!("token request for unknown username");
        return Err(rejected());
    };

    let hash = user.password_hash.clone();
    let password = zeroize::Zeroizing::new(form.password);
    let valid = blocking(move || auth::verify_password(&password, &hash)).await?;
    if !valid {
        tracing::warn!(user_id = user.id, "token request with wrong password");
        return Err(rejected());
    }

    let claims = Claims::new(
        user.id,
        &user.username,
        &user.name,
        user.scopes.clone(),
        Utc::now(),
        state.config.token_ttl_minutes,
    );
    let token = auth::issue_token(&state.jwt, &claims)
        .map_err(|e| AppError::Internal(format!("token signing failed: {e}")))?;

    tracing::info!(user_id = user.id, "access token issued");
    Ok(Json(TokenResponse {
        access_token: token,
        token_type: "bearer".into(),
    }))
}

/// GET /v1/users/me — The calling user.
#[utoipa::path(
    get,
    path = "/v1/users/me",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 400, description = "Inactive user", body = crate::error::ErrorBody),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorBody),
    ),
    tag = "users"
)]
async fn me(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<UserResponse>, AppError> {
    require_scope(&caller, &[])?;
    state
        .users
        .get(caller.user_id)
        .map(|u| Json(u.into()))
        .ok_or_else(|| not_found("user", caller.user_id))
}

/// GET /v1/users — List users.
#[utoipa::path(
    get,
    path = "/v1/users",
    params(Pagination),
    responses((status = 200, description = "Users", body = Vec<UserResponse>)),
    tag = "users"
)]
async fn list_users(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    require_scope(&caller, &["users:read"])?;
    let page = pagination.page(state.users.list());
    Ok(Json(page.into_iter().map(UserResponse::from).collect()))
}

/// POST /v1/users — Create a user.
#[utoipa::path(
    post,
    path = "/v1/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 409, description = "Username taken", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid request", body = crate::error::ErrorBody),
    ),
    tag = "users"
)]
async fn create_user(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    require_scope(&caller, &["users:write"])?;
    let req = extract_validated_json(body)?;

    let password = zeroize::Zeroizing::new(req.password);
    let password_hash = blocking(move || auth::hash_password(&password))
        .await?
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))?;

    let username = req.username.trim().to_string();
    let record = state.users.try_insert_with(|rows, id| {
        if username_taken(rows, &username, None) {
            return Err(AppError::Conflict("username already registered".into()));
        }
        Ok(UserRecord {
            id,
            username: username.clone(),
            name: req.name.trim().to_string(),
            password_hash,
            scopes: req.scopes,
            active: req.active,
            created_on: Utc::now(),
        })
    })?;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::users::save(pool, &record).await {
            state.users.remove(record.id);
            return Err(persist_failed("user", e));
        }
    }

    tracing::info!(user_id = record.id, created_by = caller.user_id, "user created");
    Ok((StatusCode::CREATED, Json(record.into())))
}

/// PUT /v1/users/:id — Edit a user.
#[utoipa::path(
    put,
    path = "/v1/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 202, description = "User updated", body = UserResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Username taken", body = crate::error::ErrorBody),
    ),
    tag = "users"
)]
async fn update_user(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<i64>,
    body: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    require_scope(&caller, &["users:write"])?;
    let req = extract_validated_json(body)?;
    if !state.users.contains(id) {
        return Err(not_found("user", id));
    }

    let password_hash = match req.password {
        Some(password) => {
            let password = zeroize::Zeroizing::new(password);
            Some(
                blocking(move || auth::hash_password(&password))
                    .await?
                    .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))?,
            )
        }
        None => None,
    };

    let username = req.username.trim().to_string();
    let (previous, record) = state
        .users
        .try_update(id, |rows, user| {
            if username_taken(rows, &username, Some(id)) {
                return Err(AppError::Conflict("username already registered".into()));
            }
            let previous = user.clone();
            user.username = username.clone();
            user.name = req.name.trim().to_string();
            user.scopes = req.scopes;
            user.active = req.active;
            if let Some(hash) = password_hash {
                user.password_hash = hash;
            }
            Ok((previous, user.clone()))
        })
        .ok_or_else(|| not_found("user", id))??;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::users::save(pool, &record).await {
            state.users.restore(id, previous);
            return Err(persist_failed("user", e));
        }
    }

    tracing::info!(user_id = id, updated_by = caller.user_id, "user updated");
    Ok((StatusCode::ACCEPTED, Json(record.into())))
}
