//! Fixed-point money arithmetic, no floating point.
//!
//! A `Money` value is a count of currency minor units (cents). Every ratio
//! applied to it rounds half away from zero back to whole minor units, so the
//! ledger can state its conservation invariants exactly.

use std::fmt;
use std::iter::Sum;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Minor units per major currency unit.
pub const MINOR_UNITS_PER_MAJOR: u64 = 100;

/// Amount of money in minor units.
///
/// # Examples
///
/// ```
/// use spacehub_types::Money;
///
/// let base = Money::from_minor(1_000);
/// let share = base.mul_ratio("0.8".parse().unwrap()).unwrap();
/// assert_eq!(share, Money::from_minor(800));
/// assert_eq!(base.checked_sub(share), Some(Money::from_minor(200)));
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Zero.
    pub const ZERO: Self = Money(0);

    /// Create from a raw minor-unit count.
    #[inline]
    pub const fn from_minor(minor: u64) -> Self {
        Money(minor)
    }

    /// Create from whole major units (e.g. `50` → `50.00`).
    #[inline]
    pub fn from_major(major: u64) -> Self {
        Money(major.saturating_mul(MINOR_UNITS_PER_MAJOR))
    }

    /// Raw minor-unit count.
    #[inline]
    pub const fn minor(&self) -> u64 {
        self.0
    }

    /// Returns `true` if the amount is exactly zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition, `None` on overflow.
    #[inline]
    pub fn checked_add(&self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    /// Checked subtraction, `None` if the result would be negative.
    #[inline]
    pub fn checked_sub(&self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Money)
    }

    /// Saturating addition.
    #[inline]
    pub fn saturating_add(&self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }

    /// Saturating subtraction (floors at zero).
    #[inline]
    pub fn saturating_sub(&self, rhs: Money) -> Money {
        Money(self.0.saturating_sub(rhs.0))
    }

    /// Multiply by a non-negative decimal ratio, rounding half away from zero.
    ///
    /// Returns `None` for negative ratios or if the result does not fit.
    pub fn mul_ratio(&self, ratio: Decimal) -> Option<Money> {
        if ratio.is_sign_negative() {
            return None;
        }
        Decimal::from(self.0)
            .checked_mul(ratio)?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_u64()
            .map(Money)
    }

    /// `self × numerator / denominator`, rounded half up.
    ///
    /// Computed in `u128` so intermediate products never overflow.
    pub fn scale(&self, numerator: Money, denominator: Money) -> Option<Money> {
        if denominator.is_zero() {
            return None;
        }
        let n = u128::from(self.0) * u128::from(numerator.0);
        let d = u128::from(denominator.0);
        let q = (2 * n + d) / (2 * d);
        u64::try_from(q).ok().map(Money)
    }

    /// `pct` percent of this amount, rounded half up.
    pub fn percent(&self, pct: u8) -> Money {
        let q = (u128::from(self.0) * u128::from(pct) * 2 + 100) / 200;
        Money(u64::try_from(q).unwrap_or(u64::MAX))
    }

    /// This amount as a whole percentage of `whole`, rounded half up.
    ///
    /// Defined as 0 when `whole` is zero; capped at 100.
    pub fn percentage_of(&self, whole: Money) -> u8 {
        if whole.is_zero() {
            return 0;
        }
        let q = (u128::from(self.0) * 200 + u128::from(whole.0)) / (2 * u128::from(whole.0));
        u8::try_from(q.min(100)).unwrap_or(100)
    }

    /// Value in major units as a decimal (e.g. `12345` → `123.45`).
    pub fn to_decimal(&self) -> Decimal {
        Decimal::from(self.0) / Decimal::from(MINOR_UNITS_PER_MAJOR)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:02}",
            self.0 / MINOR_UNITS_PER_MAJOR,
            self.0 % MINOR_UNITS_PER_MAJOR
        )
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |acc, x| acc.saturating_add(x))
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}
