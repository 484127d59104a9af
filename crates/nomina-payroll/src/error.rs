//! Engine errors.

use thiserror::Error;

/// Failures that abort a disbursement computation.
///
/// Business conditions such as a missing salary are not errors; they are
/// reported as omissions in the plan.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Net pay for an employee does not fit in the amount range.
    #[error("amount overflow computing net pay for employee {employee_id}")]
    Overflow {
        /// Employee whose computation overflowed.
        employee_id: i64,
    },

    /// The plan total does not fit in the amount range.
    #[error("amount overflow computing the disbursement total")]
    TotalOverflow,
}
