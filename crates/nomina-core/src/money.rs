//! # Money
//!
//! Fixed-point monetary amounts in integer cents.
//!
//! Floats are rejected as a storage representation: a salary of `0.1 + 0.2`
//! must not become `0.30000000000000004`. Amounts are parsed from decimal
//! strings with at most two decimal places and rendered back with exactly two.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;

/// A monetary amount in cents. Negative values are deductions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    /// The zero amount.
    pub const ZERO: Money = Money(0);

    /// Create an amount from a number of cents.
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Create an amount from whole currency units, failing on overflow.
    pub fn from_units(units: i64) -> Result<Self, ValidationError> {
        units
            .checked_mul(100)
            .map(Self)
            .ok_or(ValidationError::AmountOverflow)
    }

    /// Parse a decimal string such as `"1500"`, `"1500.5"` or `"-25.75"`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidAmount`] for blanks, non-numbers,
    /// more than two decimal places, or values that overflow `i64` cents.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidAmount(input.to_string());
        let s = input.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) if !f.is_empty() => (w, f),
            Some(_) => return Err(invalid()),
            None => (digits, ""),
        };
        if whole.is_empty()
            || frac.len() > 2
            || !whole.bytes().all(|b| b.is_ascii_digit())
            || !frac.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let whole: i64 = whole.parse().map_err(|_| invalid())?;
        let frac: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => frac.parse().map_err(|_| invalid())?,
        };
        let cents = whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(frac))
            .ok_or_else(invalid)?;
        Ok(Self(if negative { -cents } else { cents }))
    }

    /// Number of cents.
    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Whether the amount is strictly positive.
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Whether the amount is strictly negative.
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Whether the amount is zero.
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Checked addition.
    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    /// Checked subtraction.
    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Money)
    }

    /// Checked negation.
    pub fn checked_neg(self) -> Option<Money> {
        self.0.checked_neg().map(Money)
    }

    /// Sum an iterator of amounts, returning `None` on overflow.
    pub fn checked_sum<I: IntoIterator<Item = Money>>(iter: I) -> Option<Money> {
        iter.into_iter()
            .try_fold(Money::ZERO, |acc, m| acc.checked_add(m))
    }

    /// Split a non-negative amount into `parts` amounts that add up to it.
    ///
    /// Leftover cents go to the first parts, one each, so no part differs
    /// from another by more than one cent. Returns `None` when `parts` is
    /// zero or the amount is negative.
    pub fn split_even(self, parts: usize) -> Option<Vec<Money>> {
        if parts == 0 || self.0 < 0 {
            return None;
        }
        let n = i64::try_from(parts).ok()?;
        let base = self.0 / n;
        let remainder = self.0 % n;
        Some(
            (0..n)
                .map(|i| Money(base + i64::from(i < remainder)))
                .collect(),
        )
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl std::str::FromStr for Money {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::parse(s)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MoneyVisitor)
    }
}

/// Accepts `"1500.00"` as well as bare JSON numbers (`1500`, `1500.5`).
struct MoneyVisitor;

impl<'de> Visitor<'de> for MoneyVisitor {
    type Value = Money;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal amount with at most 2 decimal places")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
        Money::parse(v).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
        Money::from_units(v).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
        let units = i64::try_from(v).map_err(|_| E::custom(ValidationError::AmountOverflow))?;
        Money::from_units(units).map_err(E::custom)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Money, E> {
        if !v.is_finite() {
            return Err(E::custom(ValidationError::InvalidAmount(v.to_string())));
        }
        Money::parse(&v.to_string()).map_err(E::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_whole_and_decimal() {
        assert_eq!(Money::parse("1500").unwrap(), Money::from_cents(150_000));
        assert_eq!(Money::parse("1500.5").unwrap(), Money::from_cents(150_050));
        assert_eq!(Money::parse("0.01").unwrap(), Money::from_cents(1));
        assert_eq!(Money::parse(" 12.34 ").unwrap(), Money::from_cents(1234));
    }

    #[test]
    fn parse_negative() {
        assert_eq!(Money::parse("-25.75").unwrap(), Money::from_cents(-2575));
        assert_eq!(Money::parse("-0.50").unwrap(), Money::from_cents(-50));
    }

    #[test]
    fn parse_rejects_garbage() {
        for bad in ["", "  ", "abc", "1.234", "1.", ".5", "1.2.3", "--1", "1e3", "+5"] {
            assert!(Money::parse(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn parse_rejects_overflow() {
        assert!(Money::parse("92233720368547758.08").is_err());
    }

    #[test]
    fn display_always_two_decimals() {
        assert_eq!(Money::from_cents(150_000).to_string(), "1500.00");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_cents(-2575).to_string(), "-25.75");
        assert_eq!(Money::ZERO.to_string(), "0.00");
    }

    #[test]
    fn serde_string_and_number_forms() {
        let m: Money = serde_json::from_str("\"1000.10\"").unwrap();
        assert_eq!(m.cents(), 100_010);
        let m: Money = serde_json::from_str("1000").unwrap();
        assert_eq!(m.cents(), 100_000);
        let m: Money = serde_json::from_str("99.5").unwrap();
        assert_eq!(m.cents(), 9_950);
        assert!(serde_json::from_str::<Money>("0.333").is_err());
        assert_eq!(serde_json::to_string(&m).unwrap(), "\"99.50\"");
    }

    #[test]
    fn checked_sum_detects_overflow() {
        let items = [Money::from_cents(i64::MAX), Money::from_cents(1)];
        assert!(Money::checked_sum(items).is_none());
        let items = [Money::from_cents(10), Money::from_cents(-3)];
        assert_eq!(Money::checked_sum(items), Some(Money::from_cents(7)));
    }

    #[test]
    fn split_even_distributes_remainder_first() {
        let parts = Money::from_cents(1001).split_even(3).unwrap();
        assert_eq!(
            parts,
            vec![
                Money::from_cents(334),
                Money::from_cents(334),
                Money::from_cents(333)
            ]
        );
    }

    #[test]
    fn split_even_rejects_zero_parts_and_negative() {
        assert!(Money::from_cents(100).split_even(0).is_none());
        assert!(Money::from_cents(-100).split_even(2).is_none());
    }

    proptest! {
        #[test]
        fn split_even_preserves_total(cents in 0i64..1_000_000_000, parts in 1usize..12) {
            let split = Money::from_cents(cents).split_even(parts).unwrap();
            prop_assert_eq!(split.len(), parts);
            prop_assert_eq!(Money::checked_sum(split.iter().copied()), Some(Money::from_cents(cents)));
            let max = split.iter().max().unwrap().cents();
            let min = split.iter().min().unwrap().cents();
            prop_assert!(max - min <= 1);
        }

        #[test]
        fn display_then_parse_is_identity(cents in -1_000_000_000_000i64..1_000_000_000_000) {
            let m = Money::from_cents(cents);
            prop_assert_eq!(Money::parse(&m.to_string()).unwrap(), m);
        }
    }
}
