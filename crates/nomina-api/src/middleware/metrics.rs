//! # Request Metrics
//!
//! In-process request and error counters, exposed as JSON on `GET /metrics`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use axum::{Extension, Json};
use serde::Serialize;

/// Shared metrics state.
#[derive(Debug, Clone, Default)]
pub struct ApiMetrics {
    request_count: Arc<AtomicU64>,
    client_error_count: Arc<AtomicU64>,
    server_error_count: Arc<AtomicU64>,
}

/// Snapshot served by `GET /metrics`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub errors: u64,
    pub client_errors: u64,
    pub server_errors: u64,
}

impl ApiMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current counter values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let client_errors = self.client_error_count.load(Ordering::Relaxed);
        let server_errors = self.server_error_count.load(Ordering::Relaxed);
        MetricsSnapshot {
            requests: self.request_count.load(Ordering::Relaxed),
            errors: client_errors + server_errors,
            client_errors,
            server_errors,
        }
    }

    fn record(&self, status: axum::http::StatusCode) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        if status.is_client_error() {
            self.client_error_count.fetch_add(1, Ordering::Relaxed);
        } else if status.is_server_error() {
            self.server_error_count.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Middleware that increments request and error counters.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<ApiMetrics>().cloned();

    let response = next.run(request).await;

    if let Some(m) = metrics {
        m.record(response.status());
    }

    response
}

/// GET /metrics
#[utoipa::path(
    get,
    path = "/metrics",
    responses((status = 200, description = "Request counters", body = MetricsSnapshot)),
    tag = "service"
)]
pub async fn metrics_handler(Extension(metrics): Extension<ApiMetrics>) -> Json<MetricsSnapshot> {
    Json(metrics.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn counts_by_status_class() {
        let m = ApiMetrics::new();
        m.record(StatusCode::OK);
        m.record(StatusCode::NOT_FOUND);
        m.record(StatusCode::INTERNAL_SERVER_ERROR);
        let snap = m.snapshot();
        assert_eq!(snap.requests, 3);
        assert_eq!(snap.client_errors, 1);
        assert_eq!(snap.server_errors, 1);
        assert_eq!(snap.errors, 2);
    }

    #[test]
    fn clones_share_counters() {
        let m = ApiMetrics::new();
        m.clone().record(StatusCode::CREATED);
        assert_eq!(m.snapshot().requests, 1);
    }
}
