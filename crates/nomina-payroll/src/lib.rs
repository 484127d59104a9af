//! # nomina-payroll — Disbursement Engine
//!
//! Computes a payroll disbursement for one pay period from a snapshot of
//! facts. The engine is pure and synchronous: it never touches storage, so
//! the API service, the CLI preview and the tests all run exactly the same
//! computation.
//!
//! ## Pipeline
//!
//! For every active employee, in ascending id order:
//!
//! 1. **Salary**: the latest salary whose `valid_from` is on or before the
//!    period end.
//! 2. **Adjustments**: every adjustment whose validity window overlaps the
//!    period, signed.
//! 3. **Loans**: one installment per started loan with an outstanding
//!    balance, capped at that balance.
//! 4. **Net** = salary + adjustments − installments, with checked arithmetic.
//! 5. **Allocation**: the net is split evenly across the employee's active
//!    accounts ([`allocation`]), payroll accounts first.
//!
//! Employees that cannot be paid are reported as [`Omission`]s rather than
//! failing the whole run.
//!
//! ## Determinism
//!
//! Identical snapshots and periods always produce identical plans, including
//! the [`digest`] over the canonical rendering of every receipt line.

pub mod allocation;
pub mod digest;
pub mod engine;
pub mod error;
pub mod snapshot;

pub use engine::{
    compute, DetailPlan, DisbursementPlan, LineKind, Omission, OmissionReason, ReceiptLine,
    ReceiptPlan,
};
pub use error::EngineError;
pub use snapshot::{
    AccountFact, AdjustmentFact, EmployeeFact, LoanFact, PayrollSnapshot, SalaryFact,
};
