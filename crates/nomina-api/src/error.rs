//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps domain errors from nomina-core and nomina-payroll to HTTP status
//! codes with a JSON body carrying a machine-readable code and a message.
//! Internal error details are logged, never returned.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "CONFLICT").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details, present only for some client errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request violates a business rule (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Request could not be parsed, or the caller is inactive (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid credentials (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Caller lacks the required scope (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Conflict with current resource state (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    /// The client-facing message.
    fn public_message(&self) -> String {
        match self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            Self::NotFound(m)
            | Self::Validation(m)
            | Self::BadRequest(m)
            | Self::Unauthorized(m)
            | Self::Forbidden(m)
            | Self::Conflict(m) => m.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if matches!(&self, Self::Internal(_)) {
            tracing::error!(error = %self, "internal server error");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.public_message(),
                details: None,
            },
        };

        let mut response = (status, Json(body)).into_response();
        if matches!(&self, Self::Unauthorized(_)) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

/// Primitive validation failures are client errors.
impl From<nomina_core::ValidationError> for AppError {
    fn from(err: nomina_core::ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Engine failures come from amounts too large to add up.
impl From<nomina_payroll::EngineError> for AppError {
    fn from(err: nomina_payroll::EngineError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Internal(format!("database error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn response_parts(err: AppError) -> (StatusCode, Option<HeaderValue>, ErrorBody) {
        let response = err.into_response();
        let status = response.status();
        let www = response.headers().get(header::WWW_AUTHENTICATE).cloned();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        (status, www, body)
    }

    #[test]
    fn status_codes() {
        let cases = [
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (AppError::Validation("x".into()), StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            (AppError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            (AppError::Forbidden("x".into()), StatusCode::FORBIDDEN, "FORBIDDEN"),
            (AppError::Conflict("x".into()), StatusCode::CONFLICT, "CONFLICT"),
            (AppError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status_and_code(), (status, code));
        }
    }

    #[tokio::test]
    async fn message_is_passed_through() {
        let (status, www, body) = response_parts(AppError::Conflict("RFC already registered".into())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.error.message, "RFC already registered");
        assert!(www.is_none());
    }

    #[tokio::test]
    async fn unauthorized_carries_bearer_challenge() {
        let (status, www, body) =
            response_parts(AppError::Unauthorized("could not validate credentials".into())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(www.unwrap(), "Bearer");
        assert_eq!(body.error.code, "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn internal_hides_details() {
        let (status, _, body) = response_parts(AppError::Internal("db connection failed".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error.message, "An internal error occurred");
        assert!(body.error.details.is_none());
    }

    #[test]
    fn validation_error_from_core() {
        let err = AppError::from(nomina_core::ValidationError::InvalidRfc("XX".into()));
        match err {
            AppError::Validation(msg) => assert!(msg.contains("XX")),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn engine_overflow_is_validation() {
        let err = AppError::from(nomina_payroll::EngineError::Overflow { employee_id: 3 });
        assert_eq!(err.status_and_code().0, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
