//! # Plan Digest
//!
//! A SHA-256 digest over a canonical, line-oriented rendering of a plan:
//! the period followed by every receipt and its lines in plan order.
//! Names and free text are excluded, so renaming an employee or rewording a
//! reason does not change the digest of an already computed disbursement.
//!
//! ```text
//! period|2024|3|2024-02-01|2024-02-15
//! receipt|12|4500.00
//! line|salary|31|5000.00
//! line|loan|4|-500.00
//! line|payment|9|4500.00
//! ```

use std::fmt::Write as _;

use nomina_core::PayPeriod;
use sha2::{Digest, Sha256};

use crate::engine::ReceiptPlan;

/// Canonical rendering hashed by [`plan_digest`].
pub fn canonical_rendering(period: &PayPeriod, receipts: &[ReceiptPlan]) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = writeln!(
        out,
        "period|{}|{}|{}|{}",
        period.year(),
        period.number(),
        period.start(),
        period.end()
    );
    for receipt in receipts {
        let _ = writeln!(out, "receipt|{}|{}", receipt.employee_id, receipt.net);
        for line in &receipt.lines {
            let _ = writeln!(
                out,
                "line|{}|{}|{}",
                line.kind.as_str(),
                line.source_id,
                line.amount
            );
        }
    }
    out
}

/// Lowercase hex SHA-256 of the canonical rendering.
pub fn plan_digest(period: &PayPeriod, receipts: &[ReceiptPlan]) -> String {
    let hash = Sha256::digest(canonical_rendering(period, receipts).as_bytes());
    hash.iter().map(|b| format!("{b:02x}")).collect()
}
