//! # Custom Extractors & Validation
//!
//! Provides the [`Validate`] trait for request DTOs and helpers that turn
//! axum's extractor rejections into [`AppError`]s with the JSON error body.

use axum::extract::rejection::{FormRejection, JsonRejection, QueryRejection};
use axum::extract::Query;
use axum::{Form, Json};

use crate::error::AppError;

/// Business rules a request must satisfy beyond what serde checks.
pub trait Validate {
    /// Returns a message describing the first violated rule.
    fn validate(&self) -> Result<(), String>;
}

/// Extract a JSON body, mapping deserialization errors to [`AppError::BadRequest`].
///
/// ```ignore
/// async fn handler(body: Result<Json<T>, JsonRejection>) -> Result<..., AppError> {
///     let req = extract_json(body)?;
/// }
/// ```
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Extract a JSON body and check it with [`Validate`]; rule violations are 422.
pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let value = extract_json(result)?;
    value.validate().map_err(AppError::Validation)?;
    Ok(value)
}

/// Extract query parameters, mapping parse errors to [`AppError::BadRequest`].
pub fn extract_query<T>(result: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    result
        .map(|Query(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Extract a form body. Missing fields are 422, like any other rule violation.
pub fn extract_form<T>(result: Result<Form<T>, FormRejection>) -> Result<T, AppError> {
    result
        .map(|Form(v)| v)
        .map_err(|err| AppError::Validation(err.body_text()))
}

/// Trimmed, non-empty, at most `max` characters.
pub fn require_text(field: &str, value: &str, max: usize) -> Result<(), String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(format!("{field} must not be empty"));
    }
    if trimmed.chars().count() > max {
        return Err(format!("{field} must not exceed {max} characters"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_text_rules() {
        assert!(require_text("name", "Ana", 10).is_ok());
        assert_eq!(
            require_text("name", "   ", 10).unwrap_err(),
            "name must not be empty"
        );
        assert!(require_text("name", "abcdefghijk", 10).is_err());
    }
}
