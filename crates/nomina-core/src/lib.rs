#![deny(missing_docs)]

//! # nomina-core — Foundational Types for the Payroll Backend
//!
//! Every other crate in the workspace depends on this one. It has no
//! internal crate dependencies, only `serde`, `thiserror` and `chrono`
//! from the external ecosystem.
//!
//! ## Design Principles
//!
//! 1. **Money is integer cents.** [`Money`] never touches floating point.
//!    Amounts cross the wire as decimal strings (`"1500.00"`).
//!
//! 2. **Newtype wrappers for identifiers.** [`Rfc`] and [`Curp`] validate
//!    their format at construction time; an unchecked string cannot be
//!    passed where a taxpayer id is expected.
//!
//! 3. **Periods are semi-monthly.** A [`PayPeriod`] is a *quincena*: the
//!    1st–15th or the 16th–end of a month, numbered 1..=24 within a year.
//!
//! 4. **[`ValidationError`] hierarchy.** Structured errors with `thiserror`,
//!    no `.unwrap()` outside tests.

pub mod account;
pub mod error;
pub mod identity;
pub mod money;
pub mod period;
pub mod scope;

pub use account::AccountKind;
pub use error::ValidationError;
pub use identity::{Curp, Rfc};
pub use money::Money;
pub use period::{PayPeriod, ValidityWindow};
pub use scope::{grants, Scope, ADMIN_SCOPE};
