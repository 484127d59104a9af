//! # nomina-api — Axum API Service for Payroll Administration
//!
//! HTTP surface over the payroll domain: users and tokens, the
//! neighborhood and bank catalogs, employees and their bank accounts,
//! compensation inputs (salaries, loans, adjustments), disbursements and
//! the receipts they produce.
//!
//! ## API Surface
//!
//! | Prefix                  | Module                        | Auth      |
//! |-------------------------|-------------------------------|-----------|
//! | `/v1/users/token`       | [`routes::users`]             | none      |
//! | `/v1/users/*`           | [`routes::users`]             | `users:*` |
//! | `/v1/neighborhoods/*`, `/v1/banks/*` | [`routes::catalog`] | `neighborhoods:*`, `banks:*` |
//! | `/v1/employees/*`       | [`routes::employees`]         | `employees:*` |
//! | `/v1/accounts/*`        | [`routes::accounts`]          | `accounts:*` |
//! | `/v1/salaries/*`        | [`routes::salaries`]          | `salaries:*` |
//! | `/v1/loans/*`           | [`routes::loans`]             | `loans:*` |
//! | `/v1/adjustments/*`     | [`routes::adjustments`]       | `adjustments:*` |
//! | `/v1/disbursements/*`   | [`routes::disbursements`]     | `disbursements:*` |
//! | `/v1/receipts/*`        | [`routes::receipts`]          | `receipts:read` |
//!
//! The `Admin` scope grants every operation.
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! Extension(ApiMetrics) → TraceLayer → MetricsMiddleware → AuthMiddleware → Handler
//! ```
//!
//! Health probes, `/metrics`, `/openapi.json` and the token endpoint are
//! mounted outside the auth middleware.

pub mod auth;
pub mod bootstrap;
pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde_json::json;

use crate::middleware::metrics::{metrics_handler, metrics_middleware, ApiMetrics};
use crate::middleware::tracing_layer;
use crate::state::AppState;

/// Assemble the full application router with all routes and middleware.
pub fn app(state: AppState) -> Router {
    let metrics = ApiMetrics::new();

    let protected = routes::router()
        .route_layer(from_fn_with_state(state.clone(), auth::auth_middleware));

    let public = Router::new()
        .route("/", get(root))
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/metrics", get(metrics_handler))
        .merge(openapi::router())
        .merge(routes::users::token_router());

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(from_fn(metrics_middleware))
        .layer(tracing_layer::layer())
        .layer(Extension(metrics))
        .with_state(state)
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "server is running" }))
}

/// Liveness probe: 200 while the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe: 503 while a configured database is unreachable.
async fn readiness(State(state): State<AppState>) -> Response {
    if let Some(pool) = &state.db_pool {
        if let Err(e) = db::ping(pool).await {
            tracing::warn!(error = %e, "readiness check failed");
            return (StatusCode::SERVICE_UNAVAILABLE, "database unavailable").into_response();
        }
    }
    "ready".into_response()
}
