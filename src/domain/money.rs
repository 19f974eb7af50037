//! Integer minor-unit money.
//!
//! Every amount in the engine is carried as `i64` minor units (agorot, cents).
//! Percentages are basis points (`1200` = 12%). Conversion from the PMS's
//! major-unit decimals happens once, in the PMS parser, via [`Money::from_major`].

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

use serde::{Deserialize, Serialize};

/// Minor units per major unit for every currency the engine handles.
pub const MINOR_PER_MAJOR: i64 = 100;

const BPS_DENOMINATOR: i128 = 10_000;

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    schemars::JsonSchema,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    #[inline]
    pub const fn minor(self) -> i64 {
        self.0
    }

    /// Scale a major-unit decimal (e.g. `1234.5`) into minor units, rounding
    /// half away from zero. Returns `None` for non-finite or out-of-range input.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn from_major(major: f64) -> Option<Self> {
        if !major.is_finite() {
            return None;
        }
        let scaled = (major * MINOR_PER_MAJOR as f64).round();
        if scaled.abs() >= i64::MAX as f64 {
            return None;
        }
        Some(Money(scaled as i64))
    }

    /// Major-unit value for JSON payloads sent to the PMS.
    #[allow(clippy::cast_precision_loss)]
    pub fn to_major(self) -> f64 {
        self.0 as f64 / MINOR_PER_MAJOR as f64
    }

    /// `bps` basis points of this amount, rounded to the nearest minor unit
    /// (half away from zero). Saturates at the `i64` bounds.
    pub fn percent_bps(self, bps: u32) -> Money {
        let product = i128::from(self.0) * i128::from(bps);
        let half = BPS_DENOMINATOR / 2;
        let rounded = if product >= 0 {
            (product + half) / BPS_DENOMINATOR
        } else {
            (product - half) / BPS_DENOMINATOR
        };
        Money(i64::try_from(rounded).unwrap_or(if rounded < 0 { i64::MIN } else { i64::MAX }))
    }

    /// Multiply by `10_000 + bps` basis points, e.g. a weekend markup.
    /// Saturates instead of wrapping.
    pub fn marked_up_bps(self, bps: u32) -> Money {
        Money(self.0.saturating_add(self.percent_bps(bps).0))
    }

    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    /// Sum that reports overflow as `None` instead of panicking or wrapping.
    pub fn checked_sum(amounts: impl IntoIterator<Item = Money>) -> Option<Money> {
        amounts.into_iter().try_fold(Money::ZERO, Money::checked_add)
    }

    #[inline]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.copied().sum()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let major = abs / MINOR_PER_MAJOR.unsigned_abs();
        let minor = abs % MINOR_PER_MAJOR.unsigned_abs();
        write!(f, "{sign}{major}.{minor:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_rounds_half_up() {
        assert_eq!(Money::from_minor(630_000).percent_bps(1200).minor(), 75_600);
        assert_eq!(Money::from_minor(730_600).percent_bps(1700).minor(), 124_202);
        // 0.5 minor unit rounds away from zero
        assert_eq!(Money::from_minor(50).percent_bps(100).minor(), 1);
        assert_eq!(Money::from_minor(49).percent_bps(100).minor(), 0);
    }

    #[test]
    fn percent_of_negative_rounds_away_from_zero() {
        assert_eq!(Money::from_minor(-50).percent_bps(100).minor(), -1);
    }

    #[test]
    fn from_major_scales_once() {
        assert_eq!(Money::from_major(1000.0).unwrap().minor(), 100_000);
        assert_eq!(Money::from_major(12.35).unwrap().minor(), 1235);
        assert_eq!(Money::from_major(0.1 + 0.2).unwrap().minor(), 30);
        assert!(Money::from_major(f64::NAN).is_none());
        assert!(Money::from_major(f64::INFINITY).is_none());
    }

    #[test]
    fn markup_applies_basis_points() {
        assert_eq!(Money::from_minor(75_000).marked_up_bps(2000).minor(), 90_000);
        assert_eq!(Money::from_minor(75_000).marked_up_bps(0).minor(), 75_000);
    }

    #[test]
    fn display_formats_minor_units() {
        assert_eq!(Money::from_minor(854_802).to_string(), "8548.02");
        assert_eq!(Money::from_minor(5).to_string(), "0.05");
        assert_eq!(Money::from_minor(-550).to_string(), "-5.50");
    }

    #[test]
    fn sum_and_ops() {
        let total: Money = [Money::from_minor(100), Money::from_minor(250)]
            .iter()
            .sum();
        assert_eq!(total, Money::from_minor(350));
        assert_eq!(total - Money::from_minor(50), Money::from_minor(300));
    }

    #[test]
    fn checked_sum_reports_overflow() {
        let night = Money::from_major(5.0e16).unwrap();
        assert_eq!(Money::checked_sum([night, night]), None);
        assert_eq!(
            Money::checked_sum([Money::from_minor(100), Money::from_minor(250)]),
            Some(Money::from_minor(350))
        );
        assert_eq!(Money::checked_sum([]), Some(Money::ZERO));
    }

    #[test]
    fn huge_amounts_saturate_instead_of_wrapping() {
        let max = Money::from_minor(i64::MAX);
        assert_eq!(max.percent_bps(20_000), max);
        assert_eq!(max.marked_up_bps(2000), max);
        assert_eq!(Money::from_minor(i64::MIN).percent_bps(20_000).minor(), i64::MIN);
        assert_eq!(max + Money::from_minor(1), max);
        assert_eq!([max, max].into_iter().sum::<Money>(), max);
        assert_eq!(Money::from_minor(i64::MIN) - Money::from_minor(1), Money::from_minor(i64::MIN));
    }

    #[test]
    fn serde_is_transparent() {
        let json = serde_json::to_string(&Money::from_minor(1099)).unwrap();
        assert_eq!(json, "1099");
    }
}
