//! # Error Hierarchy
//!
//! Validation errors for the domain primitives, built with `thiserror`.
//! Each variant carries the rejected input so that operators can diagnose
//! bad requests without guesswork.

use chrono::NaiveDate;
use thiserror::Error;

/// Validation errors for domain primitive newtypes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// RFC does not conform to the SAT format (12 or 13 characters).
    #[error("invalid RFC: \"{0}\" (expected 3-4 letters, 6 digits and a 3 character homoclave)")]
    InvalidRfc(String),

    /// CURP does not conform to the RENAPO format (18 characters).
    #[error("invalid CURP: \"{0}\" (expected 18 characters: 4 letters, 6 digits, sex, state, 3 consonants, 2 check characters)")]
    InvalidCurp(String),

    /// Monetary amount could not be parsed.
    #[error("invalid amount: \"{0}\" (expected a decimal number with at most 2 decimal places)")]
    InvalidAmount(String),

    /// Monetary arithmetic overflowed the representable range.
    #[error("amount overflow")]
    AmountOverflow,

    /// Pay period number does not match its date.
    #[error("invalid pay period {number} for {date}: {reason}")]
    InvalidPeriod {
        /// The requested period number.
        number: u32,
        /// The requested period date.
        date: NaiveDate,
        /// Why the combination was rejected.
        reason: String,
    },

    /// Validity window ends before it starts.
    #[error("invalid validity window: end {end} is before start {start}")]
    InvalidWindow {
        /// Window start (inclusive).
        start: NaiveDate,
        /// Window end (inclusive).
        end: NaiveDate,
    },

    /// Permission scope string is malformed.
    #[error("invalid scope: \"{0}\" (expected \"Admin\" or \"<resource>:<action>\")")]
    InvalidScope(String),

    /// Account kind code is unknown.
    #[error("invalid account kind: {0} (expected 1 = savings or 2 = payroll)")]
    InvalidAccountKind(i16),
}
