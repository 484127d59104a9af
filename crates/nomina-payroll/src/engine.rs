//! # Disbursement Computation
//!
//! [`compute`] turns a [`PayrollSnapshot`] and a [`PayPeriod`] into a
//! [`DisbursementPlan`]: one receipt per payable employee, the employees
//! that could not be paid and why, the per-account payment details and the
//! plan digest.

use std::collections::BTreeMap;

use nomina_core::{Money, PayPeriod};
use serde::{Deserialize, Serialize};

use crate::allocation::{allocate, payable_accounts};
use crate::digest::plan_digest;
use crate::error::EngineError;
use crate::snapshot::{AdjustmentFact, EmployeeFact, LoanFact, PayrollSnapshot, SalaryFact};

/// Kind of a receipt line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    /// The period salary. Source is the salary id.
    Salary,
    /// A signed adjustment. Source is the adjustment id.
    Adjustment,
    /// A loan installment, always negative. Source is the loan id.
    Loan,
    /// A payment into an account. Source is the account id.
    Payment,
}

impl LineKind {
    /// Wire and storage name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Salary => "salary",
            Self::Adjustment => "adjustment",
            Self::Loan => "loan",
            Self::Payment => "payment",
        }
    }

    /// Parse a storage name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "salary" => Some(Self::Salary),
            "adjustment" => Some(Self::Adjustment),
            "loan" => Some(Self::Loan),
            "payment" => Some(Self::Payment),
            _ => None,
        }
    }
}

impl std::fmt::Display for LineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLine {
    /// What the line accounts for.
    pub kind: LineKind,
    /// Id of the salary, adjustment, loan or account.
    pub source_id: i64,
    /// Human-readable description.
    pub text: String,
    /// Signed amount.
    pub amount: Money,
}

/// An employee's receipt within a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptPlan {
    /// Employee paid.
    pub employee_id: i64,
    /// Full name at computation time.
    pub employee_name: String,
    /// Net pay, equal to the sum of the payment lines.
    pub net: Money,
    /// Salary, adjustment and loan lines, then payment lines.
    pub lines: Vec<ReceiptLine>,
}

impl ReceiptPlan {
    /// Lines of the given kind.
    pub fn lines_of(&self, kind: LineKind) -> impl Iterator<Item = &ReceiptLine> {
        self.lines.iter().filter(move |l| l.kind == kind)
    }
}

/// Why an active employee received no receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum OmissionReason {
    /// No salary valid on or before the period end.
    NoSalary,
    /// Deductions consume the whole salary.
    NonPositiveNet {
        /// The computed net.
        net: Money,
    },
    /// No active account at an active bank.
    NoActiveAccount,
}

/// An active employee left out of the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Omission {
    /// Employee id.
    pub employee_id: i64,
    /// Full name.
    pub employee_name: String,
    /// Why.
    #[serde(flatten)]
    pub reason: OmissionReason,
}

/// Amount paid into one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailPlan {
    /// Receiving account.
    pub account_id: i64,
    /// Account holder.
    pub employee_id: i64,
    /// Amount paid.
    pub amount: Money,
}

/// The outcome of [`compute`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisbursementPlan {
    /// Period computed.
    pub period: PayPeriod,
    /// One receipt per paid employee, by employee id.
    pub receipts: Vec<ReceiptPlan>,
    /// Active employees that were not paid, by employee id.
    pub omissions: Vec<Omission>,
    /// Payments per account, in receipt order.
    pub details: Vec<DetailPlan>,
    /// Sum of all receipt nets.
    pub total: Money,
    /// Hex SHA-256 over the canonical rendering of the receipts.
    pub digest: String,
}

impl DisbursementPlan {
    /// Whether nobody gets paid.
    pub fn is_empty(&self) -> bool {
        self.receipts.is_empty()
    }
}

/// Facts of a single employee, grouped from the snapshot.
#[derive(Default)]
struct EmployeeFacts<'a> {
    salaries: Vec<&'a SalaryFact>,
    adjustments: Vec<&'a AdjustmentFact>,
    loans: Vec<&'a LoanFact>,
}

fn group_by_employee(snapshot: &PayrollSnapshot) -> BTreeMap<i64, EmployeeFacts<'_>> {
    let mut grouped: BTreeMap<i64, EmployeeFacts<'_>> = BTreeMap::new();
    for s in &snapshot.salaries {
        grouped.entry(s.employee_id).or_default().salaries.push(s);
    }
    for a in &snapshot.adjustments {
        grouped.entry(a.employee_id).or_default().adjustments.push(a);
    }
    for l in &snapshot.loans {
        grouped.entry(l.employee_id).or_default().loans.push(l);
    }
    grouped
}

/// Compute the disbursement plan for `period`.
///
/// # Errors
///
/// Returns [`EngineError`] only when amounts overflow. Employees that
/// cannot be paid are listed in [`DisbursementPlan::omissions`].
pub fn compute(
    snapshot: &PayrollSnapshot,
    period: &PayPeriod,
) -> Result<DisbursementPlan, EngineError> {
    let grouped = group_by_employee(snapshot);
    let empty = EmployeeFacts::default();

    let mut employees: Vec<&EmployeeFact> = snapshot.employees.iter().filter(|e| e.active).collect();
    employees.sort_by_key(|e| e.id);

    let mut receipts = Vec::new();
    let mut omissions = Vec::new();
    let mut details = Vec::new();

    for employee in employees {
        let facts = grouped.get(&employee.id).unwrap_or(&empty);
        let omit = |reason| Omission {
            employee_id: employee.id,
            employee_name: employee.full_name.clone(),
            reason,
        };

        let Some(salary) = current_salary(&facts.salaries, period) else {
            omissions.push(omit(OmissionReason::NoSalary));
            continue;
        };

        let overflow = EngineError::Overflow {
            employee_id: employee.id,
        };
        let mut lines = vec![ReceiptLine {
            kind: LineKind::Salary,
            source_id: salary.id,
            text: format!("Salary effective {}", salary.valid_from),
            amount: salary.amount,
        }];
        let mut net = salary.amount;

        let mut adjustments: Vec<&AdjustmentFact> = facts
            .adjustments
            .iter()
            .copied()
            .filter(|a| a.window.overlaps(period))
            .collect();
        adjustments.sort_by_key(|a| a.id);
        for adj in adjustments {
            net = net.checked_add(adj.amount).ok_or_else(|| overflow.clone())?;
            lines.push(ReceiptLine {
                kind: LineKind::Adjustment,
                source_id: adj.id,
                text: adj.reason.clone(),
                amount: adj.amount,
            });
        }

        let mut loans: Vec<&LoanFact> = facts
            .loans
            .iter()
            .copied()
            .filter(|l| l.start_date <= period.end())
            .collect();
        loans.sort_by_key(|l| l.id);
        for loan in loans {
            let due = loan.due();
            if !due.is_positive() {
                continue;
            }
            let deduction = due.checked_neg().ok_or_else(|| overflow.clone())?;
            net = net.checked_add(deduction).ok_or_else(|| overflow.clone())?;
            let text = match &loan.comment {
                Some(c) if !c.trim().is_empty() => format!("Loan installment: {}", c.trim()),
                _ => "Loan installment".to_string(),
            };
            lines.push(ReceiptLine {
                kind: LineKind::Loan,
                source_id: loan.id,
                text,
                amount: deduction,
            });
        }

        if !net.is_positive() {
            omissions.push(omit(OmissionReason::NonPositiveNet { net }));
            continue;
        }

        let accounts = payable_accounts(&snapshot.accounts, employee.id);
        let Some(allocation) = allocate(net, &accounts) else {
            omissions.push(omit(OmissionReason::NoActiveAccount));
            continue;
        };

        for (account, amount) in allocation {
            lines.push(ReceiptLine {
                kind: LineKind::Payment,
                source_id: account.id,
                text: format!("{} {} {}", account.bank_name, account.kind.label(), account.number),
                amount,
            });
            details.push(DetailPlan {
                account_id: account.id,
                employee_id: employee.id,
                amount,
            });
        }

        receipts.push(ReceiptPlan {
            employee_id: employee.id,
            employee_name: employee.full_name.clone(),
            net,
            lines,
        });
    }

    let total = Money::checked_sum(receipts.iter().map(|r| r.net)).ok_or(EngineError::TotalOverflow)?;
    let digest = plan_digest(period, &receipts);

    tracing::debug!(
        period = %period,
        receipts = receipts.len(),
        omissions = omissions.len(),
        total = %total,
        "disbursement plan computed"
    );

    Ok(DisbursementPlan {
        period: *period,
        receipts,
        omissions,
        details,
        total,
        digest,
    })
}

/// The salary with the greatest `valid_from` on or before the period end.
fn current_salary<'a>(salaries: &[&'a SalaryFact], period: &PayPeriod) -> Option<&'a SalaryFact> {
    salaries
        .iter()
        .copied()
        .filter(|s| s.valid_from <= period.end())
        .max_by_key(|s| (s.valid_from, s.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::AccountFact;
    use chrono::NaiveDate;
    use nomina_core::{AccountKind, ValidityWindow};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn m(units: i64) -> Money {
        Money::from_units(units).unwrap()
    }

    fn period() -> PayPeriod {
        PayPeriod::new(3, d(2024, 2, 10)).unwrap()
    }

    fn employee(id: i64, active: bool) -> EmployeeFact {
        EmployeeFact {
            id,
            full_name: format!("Employee {id}"),
            active,
        }
    }

    fn salary(id: i64, employee_id: i64, valid_from: NaiveDate, amount: i64) -> SalaryFact {
        SalaryFact {
            id,
            employee_id,
            valid_from,
            amount: m(amount),
        }
    }

    fn account(id: i64, employee_id: i64, kind: AccountKind) -> AccountFact {
        AccountFact {
            id,
            employee_id,
            number: format!("0123{id}"),
            kind,
            active: true,
            bank_name: "Banorte".into(),
            bank_active: true,
        }
    }

    fn base() -> PayrollSnapshot {
        PayrollSnapshot {
            employees: vec![employee(1, true)],
            salaries: vec![salary(10, 1, d(2024, 1, 1), 5000)],
            accounts: vec![account(100, 1, AccountKind::Payroll)],
            ..Default::default()
        }
    }

    #[test]
    fn salary_only_employee_is_paid_in_full() {
        let plan = compute(&base(), &period()).unwrap();
        assert_eq!(plan.receipts.len(), 1);
        let r = &plan.receipts[0];
        assert_eq!(r.net, m(5000));
        assert_eq!(r.lines.len(), 2);
        assert_eq!(r.lines[0].kind, LineKind::Salary);
        assert_eq!(r.lines[1].kind, LineKind::Payment);
        assert_eq!(r.lines[1].source_id, 100);
        assert_eq!(plan.total, m(5000));
        assert_eq!(plan.details.len(), 1);
        assert!(plan.omissions.is_empty());
    }

    #[test]
    fn latest_salary_on_or_before_period_end_wins() {
        let mut snap = base();
        snap.salaries.push(salary(11, 1, d(2024, 2, 15), 6000));
        snap.salaries.push(salary(12, 1, d(2024, 2, 16), 9000));
        let plan = compute(&snap, &period()).unwrap();
        assert_eq!(plan.receipts[0].lines[0].source_id, 11);
        assert_eq!(plan.receipts[0].net, m(6000));
    }

    #[test]
    fn future_salary_only_means_no_salary() {
        let mut snap = base();
        snap.salaries = vec![salary(10, 1, d(2024, 3, 1), 5000)];
        let plan = compute(&snap, &period()).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.omissions[0].reason, OmissionReason::NoSalary);
    }

    #[test]
    fn adjustments_overlapping_period_are_applied_signed() {
        let mut snap = base();
        snap.adjustments = vec![
            AdjustmentFact {
                id: 2,
                employee_id: 1,
                window: ValidityWindow::new(d(2024, 2, 15), None).unwrap(),
                amount: m(-200),
                reason: "Uniform".into(),
            },
            AdjustmentFact {
                id: 1,
                employee_id: 1,
                window: ValidityWindow::new(d(2024, 1, 1), Some(d(2024, 2, 1))).unwrap(),
                amount: m(750),
                reason: "Bonus".into(),
            },
            AdjustmentFact {
                id: 3,
                employee_id: 1,
                window: ValidityWindow::new(d(2024, 1, 1), Some(d(2024, 1, 31))).unwrap(),
                amount: m(999),
                reason: "Expired".into(),
            },
        ];
        let plan = compute(&snap, &period()).unwrap();
        let r = &plan.receipts[0];
        let adj: Vec<i64> = r.lines_of(LineKind::Adjustment).map(|l| l.source_id).collect();
        assert_eq!(adj, vec![1, 2]);
        assert_eq!(r.net, m(5550));
    }

    #[test]
    fn loan_installment_capped_and_deducted() {
        let mut snap = base();
        snap.loans = vec![
            LoanFact {
                id: 5,
                employee_id: 1,
                start_date: d(2024, 1, 1),
                amount: m(1000),
                installment: m(400),
                repaid: m(800),
                comment: Some("Car".into()),
            },
            LoanFact {
                id: 6,
                employee_id: 1,
                start_date: d(2024, 2, 16),
                amount: m(1000),
                installment: m(400),
                repaid: Money::ZERO,
                comment: None,
            },
            LoanFact {
                id: 7,
                employee_id: 1,
                start_date: d(2023, 1, 1),
                amount: m(1000),
                installment: m(400),
                repaid: m(1000),
                comment: None,
            },
        ];
        let plan = compute(&snap, &period()).unwrap();
        let r = &plan.receipts[0];
        let loans: Vec<&ReceiptLine> = r.lines_of(LineKind::Loan).collect();
        assert_eq!(loans.len(), 1);
        assert_eq!(loans[0].source_id, 5);
        assert_eq!(loans[0].amount, m(-200));
        assert_eq!(loans[0].text, "Loan installment: Car");
        assert_eq!(r.net, m(4800));
    }

    #[test]
    fn non_positive_net_is_omitted() {
        let mut snap = base();
        snap.adjustments = vec![AdjustmentFact {
            id: 1,
            employee_id: 1,
            window: ValidityWindow::new(d(2024, 2, 1), None).unwrap(),
            amount: m(-5000),
            reason: "Suspension".into(),
        }];
        let plan = compute(&snap, &period()).unwrap();
        assert!(plan.is_empty());
        assert_eq!(
            plan.omissions[0].reason,
            OmissionReason::NonPositiveNet { net: Money::ZERO }
        );
    }

    #[test]
    fn no_payable_account_is_omitted() {
        let mut snap = base();
        snap.accounts[0].bank_active = false;
        let plan = compute(&snap, &period()).unwrap();
        assert_eq!(plan.omissions[0].reason, OmissionReason::NoActiveAccount);
        assert!(plan.details.is_empty());
    }

    #[test]
    fn inactive_employees_never_appear() {
        let mut snap = base();
        snap.employees.push(employee(2, false));
        snap.salaries.push(salary(20, 2, d(2024, 1, 1), 3000));
        snap.accounts.push(account(200, 2, AccountKind::Payroll));
        snap.employees.push(employee(3, false));
        let plan = compute(&snap, &period()).unwrap();
        assert!(plan.receipts.iter().all(|r| r.employee_id == 1));
        assert!(plan.omissions.is_empty());
    }

    #[test]
    fn split_across_accounts_payroll_first() {
        let mut snap = base();
        snap.salaries = vec![salary(10, 1, d(2024, 1, 1), 0)];
        snap.salaries[0].amount = Money::from_cents(100_001);
        snap.accounts = vec![
            account(100, 1, AccountKind::Savings),
            account(101, 1, AccountKind::Payroll),
        ];
        let plan = compute(&snap, &period()).unwrap();
        let payments: Vec<(i64, Money)> = plan.receipts[0]
            .lines_of(LineKind::Payment)
            .map(|l| (l.source_id, l.amount))
            .collect();
        assert_eq!(
            payments,
            vec![(101, Money::from_cents(50_001)), (100, Money::from_cents(50_000))]
        );
        assert_eq!(plan.receipts[0].lines[2].text, "Banorte Ahorro 0123100");
    }

    #[test]
    fn receipts_in_employee_id_order() {
        let mut snap = base();
        snap.employees.insert(0, employee(9, true));
        snap.salaries.push(salary(90, 9, d(2024, 1, 1), 100));
        snap.accounts.push(account(900, 9, AccountKind::Savings));
        let plan = compute(&snap, &period()).unwrap();
        let ids: Vec<i64> = plan.receipts.iter().map(|r| r.employee_id).collect();
        assert_eq!(ids, vec![1, 9]);
        assert_eq!(plan.total, m(5100));
    }

    #[test]
    fn overflow_is_an_error() {
        let mut snap = base();
        snap.salaries[0].amount = Money::from_cents(i64::MAX);
        snap.adjustments = vec![AdjustmentFact {
            id: 1,
            employee_id: 1,
            window: ValidityWindow::new(d(2024, 1, 1), None).unwrap(),
            amount: Money::from_cents(1),
            reason: "x".into(),
        }];
        assert_eq!(
            compute(&snap, &period()),
            Err(EngineError::Overflow { employee_id: 1 })
        );
    }

    #[test]
    fn same_inputs_same_digest() {
        let a = compute(&base(), &period()).unwrap();
        let b = compute(&base(), &period()).unwrap();
        assert_eq!(a.digest, b.digest);
        let mut changed = base();
        changed.salaries[0].amount = m(5001);
        assert_ne!(a.digest, compute(&changed, &period()).unwrap().digest);
    }

    #[test]
    fn omission_serializes_with_reason_tag() {
        let o = Omission {
            employee_id: 4,
            employee_name: "X".into(),
            reason: OmissionReason::NonPositiveNet { net: m(-3) },
        };
        let v = serde_json::to_value(&o).unwrap();
        assert_eq!(v["reason"], "non_positive_net");
        assert_eq!(v["net"], "-3.00");
    }
}
