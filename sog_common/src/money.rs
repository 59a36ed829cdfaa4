use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

pub const CURRENCY_CODE: &str = "USD";

//--------------------------------------        Money        ---------------------------------------------------------
/// A fixed-point currency amount, stored as an integer number of cents.
///
/// All order arithmetic (line totals, subtotals, price deltas) is done on `Money` so that sums are exact. Serializes as
/// the raw number of cents.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Money(i64);

macro_rules! cents_arithmetic {
    ($($op:ident::$f:ident, $op_assign:ident::$f_assign:ident);*) => {$(
        impl $op for Money {
            type Output = Self;

            fn $f(self, rhs: Self) -> Self {
                Self(self.0.$f(rhs.0))
            }
        }

        impl $op_assign for Money {
            fn $f_assign(&mut self, rhs: Self) {
                self.0.$f_assign(rhs.0)
            }
        }
    )*};
}

cents_arithmetic!(Add::add, AddAssign::add_assign; Sub::sub, SubAssign::sub_assign);

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a currency amount: {0}")]
pub struct MoneyConversionError(String);

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Money {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Money {}

impl TryFrom<u64> for Money {
    type Error = MoneyConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        i64::try_from(value)
            .map(Self)
            .map_err(|_| MoneyConversionError(format!("Value {value} is too large to convert to Money")))
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let cents = self.0.unsigned_abs();
        write!(f, "{sign}${}.{:02}", cents / 100, cents % 100)
    }
}

/// Parses "12", "12.5", "12.50" and "$12.50" (optionally negative) into cents. More than two decimal places is an
/// error rather than a silent rounding.
impl FromStr for Money {
    type Err = MoneyConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (negative, rest) = match trimmed.strip_prefix('-') {
            Some(r) => (true, r),
            None => (false, trimmed),
        };
        let rest = rest.strip_prefix('$').unwrap_or(rest);
        let (whole, frac) = match rest.split_once('.') {
            Some((w, f)) => (w, f),
            None => (rest, ""),
        };
        if whole.is_empty() || frac.len() > 2 || !whole.chars().all(|c| c.is_ascii_digit()) {
            return Err(MoneyConversionError(s.to_string()));
        }
        if !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(MoneyConversionError(s.to_string()));
        }
        let whole = whole.parse::<i64>().map_err(|e| MoneyConversionError(format!("{s}: {e}")))?;
        let frac = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|e| MoneyConversionError(format!("{s}: {e}")))? * 10,
            _ => frac.parse::<i64>().map_err(|e| MoneyConversionError(format!("{s}: {e}")))?,
        };
        let cents = whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(frac))
            .ok_or_else(|| MoneyConversionError(format!("{s} is out of range")))?;
        Ok(Self(if negative { -cents } else { cents }))
    }
}

impl Money {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub fn from_dollars(dollars: i64) -> Self {
        Self(dollars * 100)
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// The amount as a plain decimal string without a currency symbol, e.g. `20.00` or `-0.05`.
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let cents = self.0.unsigned_abs();
        format!("{sign}{}.{:02}", cents / 100, cents % 100)
    }

    /// The magnitude of `self` relative to `base`, in basis points (1/100th of a percent), rounded down.
    ///
    /// Returns `None` when `base` is zero, since there is no meaningful relative change from nothing.
    pub fn basis_points_of(&self, base: Money) -> Option<i64> {
        if base.0 == 0 {
            return None;
        }
        let bps = i128::from(self.0).abs() * 10_000 / i128::from(base.0).abs();
        Some(i64::try_from(bps).unwrap_or(i64::MAX))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(Money::from_cents(12_000).to_string(), "$120.00");
        assert_eq!(Money::from_cents(-2_005).to_string(), "-$20.05");
        assert_eq!(Money::from_cents(7).to_string(), "$0.07");
        assert_eq!(Money::from_dollars(20).to_decimal_string(), "20.00");
        assert_eq!(Money::from_cents(-5).to_decimal_string(), "-0.05");
    }

    #[test]
    fn parse() {
        assert_eq!("120".parse::<Money>().unwrap(), Money::from_dollars(120));
        assert_eq!("$12.5".parse::<Money>().unwrap(), Money::from_cents(1250));
        assert_eq!("-0.05".parse::<Money>().unwrap(), Money::from_cents(-5));
        assert!("12.345".parse::<Money>().is_err());
        assert!("abc".parse::<Money>().is_err());
        assert!("".parse::<Money>().is_err());
    }

    #[test]
    fn arithmetic() {
        let unit = Money::from_cents(1_999);
        assert_eq!(unit * 3, Money::from_cents(5_997));
        let total: Money = [unit, unit, Money::from_cents(2)].iter().sum();
        assert_eq!(total, Money::from_dollars(40));
        assert_eq!(-(unit - Money::from_dollars(20)), Money::from_cents(1));
    }

    #[test]
    fn basis_points() {
        let delta = Money::from_dollars(2);
        assert_eq!(delta.basis_points_of(Money::from_dollars(100)), Some(200));
        assert_eq!((-delta).basis_points_of(Money::from_dollars(100)), Some(200));
        assert_eq!(delta.basis_points_of(Money::default()), None);
    }

    #[test]
    fn serializes_as_cents() {
        let json = serde_json::to_string(&Money::from_cents(12_345)).unwrap();
        assert_eq!(json, "12345");
    }
}
