//! # Payroll Snapshot
//!
//! The facts a disbursement is computed from. The API service builds a
//! snapshot from its stores under the disbursement lock; the CLI reads one
//! from a JSON file.

use chrono::NaiveDate;
use nomina_core::{AccountKind, Money, ValidityWindow};
use serde::{Deserialize, Serialize};

/// An employee as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeFact {
    /// Employee id.
    pub id: i64,
    /// "name paternal maternal".
    pub full_name: String,
    /// Inactive employees are skipped entirely.
    pub active: bool,
}

/// A salary record. The amount is paid per period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryFact {
    /// Salary id.
    pub id: i64,
    /// Owner.
    pub employee_id: i64,
    /// First day the salary applies.
    pub valid_from: NaiveDate,
    /// Amount per pay period.
    pub amount: Money,
}

/// A one-off or recurring adjustment. Positive amounts are perceptions,
/// negative amounts deductions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentFact {
    /// Adjustment id.
    pub id: i64,
    /// Owner.
    pub employee_id: i64,
    /// Days on which the adjustment applies.
    pub window: ValidityWindow,
    /// Signed amount applied once per overlapping period.
    pub amount: Money,
    /// Shown on the receipt line.
    pub reason: String,
}

/// A loan repaid by per-period installments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanFact {
    /// Loan id.
    pub id: i64,
    /// Borrower.
    pub employee_id: i64,
    /// First day installments may be deducted.
    pub start_date: NaiveDate,
    /// Total amount lent.
    pub amount: Money,
    /// Amount deducted per period.
    pub installment: Money,
    /// Sum of installments already deducted by earlier disbursements.
    #[serde(default)]
    pub repaid: Money,
    /// Free-form note.
    #[serde(default)]
    pub comment: Option<String>,
}

impl LoanFact {
    /// Remaining balance, or `None` on overflow.
    pub fn outstanding(&self) -> Option<Money> {
        self.amount.checked_sub(self.repaid)
    }

    /// Installment due for a period: the configured installment capped at
    /// the outstanding balance. Zero when nothing is owed.
    pub fn due(&self) -> Money {
        match self.outstanding() {
            Some(out) if out.is_positive() => self.installment.min(out),
            _ => Money::ZERO,
        }
    }
}

/// A bank account as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountFact {
    /// Account id.
    pub id: i64,
    /// Holder.
    pub employee_id: i64,
    /// Account number.
    pub number: String,
    /// Savings or payroll.
    pub kind: AccountKind,
    /// Account flag.
    pub active: bool,
    /// Name of the bank holding the account.
    pub bank_name: String,
    /// Bank flag. Accounts at inactive banks are never paid into.
    pub bank_active: bool,
}

impl AccountFact {
    /// Whether payments may be made into this account.
    pub fn is_payable(&self) -> bool {
        self.active && self.bank_active
    }
}

/// Every fact needed to compute a disbursement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollSnapshot {
    /// Employees, in any order.
    #[serde(default)]
    pub employees: Vec<EmployeeFact>,
    /// Salaries.
    #[serde(default)]
    pub salaries: Vec<SalaryFact>,
    /// Adjustments.
    #[serde(default)]
    pub adjustments: Vec<AdjustmentFact>,
    /// Loans with their repaid sums.
    #[serde(default)]
    pub loans: Vec<LoanFact>,
    /// Accounts with their bank's name and flag.
    #[serde(default)]
    pub accounts: Vec<AccountFact>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loan(amount: i64, installment: i64, repaid: i64) -> LoanFact {
        LoanFact {
            id: 1,
            employee_id: 1,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            amount: Money::from_cents(amount),
            installment: Money::from_cents(installment),
            repaid: Money::from_cents(repaid),
            comment: None,
        }
    }

    #[test]
    fn due_is_capped_by_outstanding() {
        assert_eq!(loan(10_000, 3_000, 0).due(), Money::from_cents(3_000));
        assert_eq!(loan(10_000, 3_000, 9_000).due(), Money::from_cents(1_000));
        assert_eq!(loan(10_000, 3_000, 10_000).due(), Money::ZERO);
        assert_eq!(loan(10_000, 3_000, 12_000).due(), Money::ZERO);
    }

    #[test]
    fn snapshot_from_json_with_defaults() {
        let json = r#"{
            "employees": [{"id": 1, "full_name": "Ana Ruiz Paz", "active": true}],
            "salaries": [{"id": 1, "employee_id": 1, "valid_from": "2024-01-01", "amount": "5000.00"}],
            "loans": [{"id": 3, "employee_id": 1, "start_date": "2024-01-01", "amount": "900", "installment": "100"}]
        }"#;
        let snap: PayrollSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snap.salaries[0].amount, Money::from_cents(500_000));
        assert_eq!(snap.loans[0].repaid, Money::ZERO);
        assert!(snap.accounts.is_empty());
    }
}
