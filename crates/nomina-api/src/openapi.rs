//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI spec,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI spec for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Nomina API",
        version = "0.1.0",
        description = "Payroll administration: employees, bank accounts, salaries, loans, adjustments, semi-monthly disbursements and receipts."
    ),
    paths(
        // Users
        crate::routes::users::issue_token,
        crate::routes::users::me,
        crate::routes::users::list_users,
        crate::routes::users::create_user,
        crate::routes::users::update_user,
        // Catalog
        crate::routes::catalog::list_neighborhoods,
        crate::routes::catalog::create_neighborhood,
        crate::routes::catalog::list_banks,
        crate::routes::catalog::create_bank,
        crate::routes::catalog::update_bank,
        crate::routes::catalog::delete_bank,
        // Employees
        crate::routes::employees::list_employees,
        crate::routes::employees::get_employee,
        crate::routes::employees::create_employee,
        crate::routes::employees::update_employee,
        // Accounts
        crate::routes::accounts::list_accounts,
        crate::routes::accounts::create_account,
        crate::routes::accounts::update_account,
        crate::routes::accounts::delete_account,
        // Compensation
        crate::routes::salaries::list_salaries,
        crate::routes::salaries::create_salary,
        crate::routes::salaries::update_salary,
        crate::routes::salaries::delete_salary,
        crate::routes::loans::list_loans,
        crate::routes::loans::create_loan,
        crate::routes::loans::update_loan,
        crate::routes::loans::delete_loan,
        crate::routes::adjustments::list_adjustments,
        crate::routes::adjustments::create_adjustment,
        crate::routes::adjustments::update_adjustment,
        crate::routes::adjustments::delete_adjustment,
        // Disbursements
        crate::routes::disbursements::list_disbursements,
        crate::routes::disbursements::get_disbursement,
        crate::routes::disbursements::create_disbursement,
        crate::routes::disbursements::delete_disbursement,
        // Receipts
        crate::routes::receipts::list_receipts,
        crate::routes::receipts::get_receipt,
        crate::routes::receipts::list_employee_receipts,
        crate::routes::receipts::list_disbursement_receipts,
        // Service
        crate::middleware::metrics::metrics_handler,
    ),
    components(schemas(
        crate::state::NeighborhoodRecord,
        crate::state::BankRecord,
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::middleware::metrics::MetricsSnapshot,
        crate::routes::users::TokenForm,
        crate::routes::users::TokenResponse,
        crate::routes::users::CreateUserRequest,
        crate::routes::users::UpdateUserRequest,
        crate::routes::users::UserResponse,
        crate::routes::catalog::CreateNeighborhoodRequest,
        crate::routes::catalog::BankRequest,
        crate::routes::employees::EmployeeRequest,
        crate::routes::employees::EmployeeResponse,
        crate::routes::accounts::CreateAccountRequest,
        crate::routes::accounts::UpdateAccountRequest,
        crate::routes::accounts::AccountResponse,
        crate::routes::salaries::CreateSalaryRequest,
        crate::routes::salaries::UpdateSalaryRequest,
        crate::routes::salaries::SalaryResponse,
        crate::routes::loans::CreateLoanRequest,
        crate::routes::loans::UpdateLoanRequest,
        crate::routes::loans::LoanResponse,
        crate::routes::adjustments::CreateAdjustmentRequest,
        crate::routes::adjustments::UpdateAdjustmentRequest,
        crate::routes::adjustments::AdjustmentResponse,
        crate::routes::disbursements::CreateDisbursementRequest,
        crate::routes::disbursements::PlanResponse,
        crate::routes::disbursements::DisbursementSummary,
        crate::routes::disbursements::DetailResponse,
        crate::routes::disbursements::DisbursementWithDetails,
        crate::routes::receipts::ReceiptSummary,
        crate::routes::receipts::ReceiptLineResponse,
        crate::routes::receipts::ReceiptWithLines,
    )),
    tags(
        (name = "users", description = "Users and access tokens"),
        (name = "catalog", description = "Neighborhoods and banks"),
        (name = "employees", description = "Employees"),
        (name = "accounts", description = "Employee bank accounts"),
        (name = "salaries", description = "Salary history"),
        (name = "loans", description = "Loans repaid by installments"),
        (name = "adjustments", description = "Bonuses and deductions"),
        (name = "disbursements", description = "Payroll runs"),
        (name = "receipts", description = "Per-employee receipts"),
        (name = "service", description = "Service metrics"),
    )
)]
pub struct ApiDoc;

/// Serves the OpenAPI JSON spec at `/openapi.json`.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json — Return the generated OpenAPI specification.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_resource_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/v1/users/token",
            "/v1/employees/{id}",
            "/v1/disbursements",
            "/v1/receipts/disbursement/{id}",
            "/metrics",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
