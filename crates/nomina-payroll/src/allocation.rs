//! # Account Allocation
//!
//! Splits an employee's net pay across the accounts that may receive it.
//! Payroll accounts come first, then by ascending id; the first accounts in
//! that order absorb leftover cents.

use nomina_core::{AccountKind, Money};

use crate::snapshot::AccountFact;

/// The employee's payable accounts in payment order.
pub fn payable_accounts(accounts: &[AccountFact], employee_id: i64) -> Vec<&AccountFact> {
    let mut payable: Vec<&AccountFact> = accounts
        .iter()
        .filter(|a| a.employee_id == employee_id && a.is_payable())
        .collect();
    payable.sort_by_key(|a| (a.kind != AccountKind::Payroll, a.id));
    payable
}

/// Split `net` evenly across `accounts`.
///
/// Returns `None` when there are no accounts or `net` is negative. The
/// amounts always add up to `net`.
pub fn allocate<'a>(
    net: Money,
    accounts: &[&'a AccountFact],
) -> Option<Vec<(&'a AccountFact, Money)>> {
    let parts = net.split_even(accounts.len())?;
    Some(accounts.iter().copied().zip(parts).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(id: i64, employee_id: i64, kind: AccountKind, active: bool, bank_active: bool) -> AccountFact {
        AccountFact {
            id,
            employee_id,
            number: format!("000{id}"),
            kind,
            active,
            bank_name: "Banco".into(),
            bank_active,
        }
    }

    #[test]
    fn payroll_accounts_first_then_id() {
        let accounts = vec![
            account(1, 7, AccountKind::Savings, true, true),
            account(2, 7, AccountKind::Payroll, true, true),
            account(3, 7, AccountKind::Savings, true, true),
            account(4, 7, AccountKind::Payroll, true, true),
        ];
        let ids: Vec<i64> = payable_accounts(&accounts, 7).iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![2, 4, 1, 3]);
    }

    #[test]
    fn inactive_accounts_and_banks_excluded() {
        let accounts = vec![
            account(1, 7, AccountKind::Payroll, false, true),
            account(2, 7, AccountKind::Payroll, true, false),
            account(3, 8, AccountKind::Payroll, true, true),
            account(4, 7, AccountKind::Savings, true, true),
        ];
        let ids: Vec<i64> = payable_accounts(&accounts, 7).iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![4]);
    }

    #[test]
    fn remainder_goes_to_first_account() {
        let accounts = vec![
            account(1, 7, AccountKind::Savings, true, true),
            account(2, 7, AccountKind::Payroll, true, true),
        ];
        let payable = payable_accounts(&accounts, 7);
        let split = allocate(Money::from_cents(1001), &payable).unwrap();
        assert_eq!(split[0].0.id, 2);
        assert_eq!(split[0].1, Money::from_cents(501));
        assert_eq!(split[1].1, Money::from_cents(500));
    }

    #[test]
    fn no_accounts_no_allocation() {
        assert!(allocate(Money::from_cents(100), &[]).is_none());
    }
}
