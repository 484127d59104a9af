//! Property tests for the disbursement plan invariants.

use chrono::NaiveDate;
use nomina_core::{AccountKind, Money, PayPeriod, ValidityWindow};
use nomina_payroll::{
    compute, AccountFact, AdjustmentFact, EmployeeFact, LineKind, LoanFact, PayrollSnapshot,
    SalaryFact,
};
use proptest::prelude::*;

fn period() -> PayPeriod {
    PayPeriod::new(6, NaiveDate::from_ymd_opt(2024, 3, 20).unwrap()).unwrap()
}

fn day(offset: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap() + chrono::Duration::days(offset)
}

prop_compose! {
    fn employee_case(id: i64)(
        active in any::<bool>(),
        salary in 0i64..2_000_000,
        salary_offset in -60i64..60,
        adjustments in prop::collection::vec((-300_000i64..300_000, -60i64..60), 0..4),
        loans in prop::collection::vec((1i64..500_000, 1i64..200_000, 0i64..600_000, -60i64..60), 0..3),
        accounts in prop::collection::vec((any::<bool>(), any::<bool>(), any::<bool>()), 0..4),
    ) -> (EmployeeFact, Vec<SalaryFact>, Vec<AdjustmentFact>, Vec<LoanFact>, Vec<AccountFact>) {
        let employee = EmployeeFact { id, full_name: format!("E{id}"), active };
        let salaries = vec![SalaryFact {
            id: id * 10,
            employee_id: id,
            valid_from: day(salary_offset),
            amount: Money::from_cents(salary),
        }];
        let adjustments = adjustments
            .into_iter()
            .enumerate()
            .map(|(i, (amount, start))| AdjustmentFact {
                id: id * 10 + i as i64,
                employee_id: id,
                window: ValidityWindow::new(day(start), Some(day(start + 10))).unwrap(),
                amount: Money::from_cents(amount),
                reason: "adj".into(),
            })
            .collect();
        let loans = loans
            .into_iter()
            .enumerate()
            .map(|(i, (amount, installment, repaid, start))| LoanFact {
                id: id * 10 + i as i64,
                employee_id: id,
                start_date: day(start),
                amount: Money::from_cents(amount),
                installment: Money::from_cents(installment),
                repaid: Money::from_cents(repaid),
                comment: None,
            })
            .collect();
        let accounts = accounts
            .into_iter()
            .enumerate()
            .map(|(i, (payroll, active, bank_active))| AccountFact {
                id: id * 10 + i as i64,
                employee_id: id,
                number: format!("{id}-{i}"),
                kind: if payroll { AccountKind::Payroll } else { AccountKind::Savings },
                active,
                bank_name: "Banco".into(),
                bank_active,
            })
            .collect();
        (employee, salaries, adjustments, loans, accounts)
    }
}

fn snapshot_strategy() -> impl Strategy<Value = PayrollSnapshot> {
    (employee_case(1), employee_case(2), employee_case(3), employee_case(4)).prop_map(|cases| {
        let mut snap = PayrollSnapshot::default();
        for (e, s, a, l, acc) in [cases.0, cases.1, cases.2, cases.3] {
            snap.employees.push(e);
            snap.salaries.extend(s);
            snap.adjustments.extend(a);
            snap.loans.extend(l);
            snap.accounts.extend(acc);
        }
        snap
    })
}

proptest! {
    #[test]
    fn receipts_balance(snap in snapshot_strategy()) {
        let plan = compute(&snap, &period()).unwrap();
        for r in &plan.receipts {
            let payments = Money::checked_sum(r.lines_of(LineKind::Payment).map(|l| l.amount)).unwrap();
            prop_assert_eq!(payments, r.net);
            let earned = Money::checked_sum(
                r.lines.iter().filter(|l| l.kind != LineKind::Payment).map(|l| l.amount),
            )
            .unwrap();
            prop_assert_eq!(earned, r.net);
            prop_assert!(r.net.is_positive());
        }
    }

    #[test]
    fn details_sum_to_total(snap in snapshot_strategy()) {
        let plan = compute(&snap, &period()).unwrap();
        let details = Money::checked_sum(plan.details.iter().map(|d| d.amount)).unwrap();
        prop_assert_eq!(details, plan.total);
    }

    #[test]
    fn inactive_employees_absent(snap in snapshot_strategy()) {
        let plan = compute(&snap, &period()).unwrap();
        for e in snap.employees.iter().filter(|e| !e.active) {
            prop_assert!(plan.receipts.iter().all(|r| r.employee_id != e.id));
            prop_assert!(plan.omissions.iter().all(|o| o.employee_id != e.id));
        }
        let active = snap.employees.iter().filter(|e| e.active).count();
        prop_assert_eq!(plan.receipts.len() + plan.omissions.len(), active);
    }

    #[test]
    fn installments_never_exceed_outstanding(snap in snapshot_strategy()) {
        let plan = compute(&snap, &period()).unwrap();
        for r in &plan.receipts {
            for line in r.lines_of(LineKind::Loan) {
                let loan = snap.loans.iter().find(|l| l.id == line.source_id && l.employee_id == r.employee_id).unwrap();
                let outstanding = loan.outstanding().unwrap();
                prop_assert!(line.amount.is_negative());
                prop_assert!(line.amount.checked_neg().unwrap() <= outstanding);
                prop_assert!(line.amount.checked_neg().unwrap() <= loan.installment);
            }
        }
    }
}
